//! CSS-selector driven HTML extraction

use super::types::{Extraction, FieldRule, FieldSource, PageContext, RecordExtractor};
use crate::clean::{collapse_whitespace, fix_mojibake};
use crate::error::{Error, Result};
use crate::pagination::{parse_selector, PageReference, Paginator, Seed};
use crate::record::{FieldSet, Record};
use crate::types::OptionStringExt;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use tracing::{debug, warn};
use url::Url;

/// A field rule with its selector parsed up front
#[derive(Debug)]
struct CompiledRule {
    rule: FieldRule,
    selector: Option<Selector>,
}

/// Extracts one record per element matching a row selector
///
/// Each [`FieldRule`] is evaluated relative to the row. Rows missing a
/// required field are skipped and counted; they never fail the page.
/// When any rule reads table cells, rows without `td` cells (header rows)
/// are ignored entirely.
pub struct HtmlExtractor {
    fields: FieldSet,
    row_css: String,
    row_selector: Selector,
    cell_selector: Selector,
    rules: Vec<CompiledRule>,
    uses_cells: bool,
    paginator: Box<dyn Paginator>,
    repair_encoding: bool,
}

impl HtmlExtractor {
    /// Create an extractor for rows matching `row_css`
    ///
    /// Fails when a selector does not parse, a field name repeats, or no
    /// rules are given.
    pub fn new(
        row_css: impl Into<String>,
        rules: Vec<FieldRule>,
        paginator: Box<dyn Paginator>,
    ) -> Result<Self> {
        let row_css = row_css.into();
        if rules.is_empty() {
            return Err(Error::config("Extractor needs at least one field"));
        }

        let mut names = HashSet::new();
        for rule in &rules {
            if !names.insert(rule.name.as_str()) {
                return Err(Error::invalid_value(
                    "extract.fields",
                    format!("duplicate field '{}'", rule.name),
                ));
            }
        }

        let fields = FieldSet::new(rules.iter().map(|r| r.name.clone()));
        let uses_cells = rules
            .iter()
            .any(|r| matches!(r.source, FieldSource::Cell(_)));

        let rules = rules
            .into_iter()
            .map(|rule| {
                let selector = match &rule.source {
                    FieldSource::Css { selector, .. } => Some(parse_selector(selector)?),
                    _ => None,
                };
                Ok(CompiledRule { rule, selector })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            fields,
            row_selector: parse_selector(&row_css)?,
            row_css,
            cell_selector: parse_selector("td")?,
            rules,
            uses_cells,
            paginator,
            repair_encoding: false,
        })
    }

    /// Repair mojibake in every extracted value
    #[must_use]
    pub fn with_encoding_repair(mut self, enabled: bool) -> Self {
        self.repair_encoding = enabled;
        self
    }

    /// The row selector
    pub fn row_css(&self) -> &str {
        &self.row_css
    }

    fn extract_row(
        &self,
        row: ElementRef<'_>,
        cells: &[ElementRef<'_>],
        context: &PageContext<'_>,
    ) -> Result<Record> {
        let mut record = Record::new(&self.fields);

        for compiled in &self.rules {
            let rule = &compiled.rule;
            let mut value = match (&rule.source, &compiled.selector) {
                (FieldSource::Css { attribute, .. }, Some(selector)) => {
                    row.select(selector).next().and_then(|el| match attribute {
                        Some(attr) => el.value().attr(attr).map(|v| v.trim().to_string()),
                        None => Some(element_text(el)),
                    })
                }
                (FieldSource::Cell(idx), _) => cells.get(*idx).map(|el| element_text(*el)),
                (FieldSource::PageUrl, _) => Some(context.page_url.to_string()),
                (FieldSource::Seed, _) => context.seed.map(str::to_string),
                (FieldSource::Constant(v), _) => Some(v.clone()),
                (FieldSource::Css { .. }, None) => None,
            }
            .none_if_empty();

            if self.repair_encoding {
                value = value.map(|v| fix_mojibake(&v).into_owned());
            }
            if rule.resolve_url {
                value = value.map(|v| resolve_against(context.page_url, &v));
            }

            if value.is_none() && rule.required {
                return Err(Error::extraction(&rule.name, "required value missing"));
            }
            record.set(&rule.name, value)?;
        }

        Ok(record)
    }
}

impl std::fmt::Debug for HtmlExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HtmlExtractor")
            .field("row_css", &self.row_css)
            .field("fields", &self.fields)
            .field("repair_encoding", &self.repair_encoding)
            .finish_non_exhaustive()
    }
}

impl RecordExtractor for HtmlExtractor {
    fn fields(&self) -> &FieldSet {
        &self.fields
    }

    fn extract(&self, content: &str, context: &PageContext<'_>) -> Result<Extraction> {
        let document = Html::parse_document(content);
        let mut records = Vec::new();
        let mut skipped = 0;

        for row in document.select(&self.row_selector) {
            let cells: Vec<ElementRef<'_>> = if self.uses_cells {
                row.select(&self.cell_selector).collect()
            } else {
                Vec::new()
            };
            if self.uses_cells && cells.is_empty() {
                continue;
            }

            match self.extract_row(row, &cells, context) {
                Ok(record) => records.push(record),
                Err(e) => {
                    debug!(page = %context.page_url, "Skipping row: {e}");
                    skipped += 1;
                }
            }
        }

        if skipped > 0 {
            warn!(page = %context.page_url, skipped, "Skipped malformed rows");
        }

        // relative links resolve against the URL that served the page
        let current = match context.reference {
            PageReference::AbsoluteUrl(_) => PageReference::url(context.page_url),
            other => other.clone(),
        };
        let next = self.paginator.next_reference(&current, &document);
        Ok(Extraction::new(records, next).with_skipped(skipped))
    }
}

/// Whitespace-collapsed text content of an element
fn element_text(element: ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<String>())
}

/// Resolve `value` against `base`, leaving it as is when either fails to parse
fn resolve_against(base: &str, value: &str) -> String {
    Url::parse(base)
        .and_then(|b| b.join(value))
        .map(String::from)
        .unwrap_or_else(|_| value.to_string())
}

/// Collect seeds from the links matching `link_css` on a root page
///
/// The seed label is the link text, the reference is the link target
/// resolved against `page_url`. Links with empty text or target are
/// ignored, as are repeated targets.
pub fn parse_seed_links(content: &str, page_url: &str, link_css: &str) -> Result<Vec<Seed>> {
    let selector = parse_selector(link_css)?;
    let document = Html::parse_document(content);
    let mut seen = HashSet::new();
    let mut seeds = Vec::new();

    for link in document.select(&selector) {
        let label = element_text(link);
        let Some(href) = link.value().attr("href").map(str::trim) else {
            continue;
        };
        if label.is_empty() || href.is_empty() {
            continue;
        }
        let target = resolve_against(page_url, href);
        if seen.insert(target.clone()) {
            seeds.push(Seed::new(label, PageReference::AbsoluteUrl(target)));
        }
    }

    debug!(count = seeds.len(), root = %page_url, "Discovered seeds");
    Ok(seeds)
}
