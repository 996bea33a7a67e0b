//! Tool catalog and search.
//!
//! The catalog is static: every tool the service knows about, with the
//! metadata the switcher needs to list, filter and open it. Search is fuzzy
//! over names, ids and keywords, boosted by how often a tool is used.

use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::services::{calculator, units};

const MB: u64 = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolCategory {
    Calculators,
    Converters,
    Health,
    Finance,
    Text,
    Pdf,
    Image,
    Audio,
}

impl ToolCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolCategory::Calculators => "calculators",
            ToolCategory::Converters => "converters",
            ToolCategory::Health => "health",
            ToolCategory::Finance => "finance",
            ToolCategory::Text => "text",
            ToolCategory::Pdf => "pdf",
            ToolCategory::Image => "image",
            ToolCategory::Audio => "audio",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        ALL_CATEGORIES
            .iter()
            .copied()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
    }
}

const ALL_CATEGORIES: [ToolCategory; 8] = [
    ToolCategory::Calculators,
    ToolCategory::Converters,
    ToolCategory::Health,
    ToolCategory::Finance,
    ToolCategory::Text,
    ToolCategory::Pdf,
    ToolCategory::Image,
    ToolCategory::Audio,
];

/// How a tool produces its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolKind {
    /// Pure formula, runnable through `POST /api/tools/:id/run`.
    Formula,
    /// Backed by the exchange-rate cache.
    Currency,
    /// Takes file uploads.
    Upload,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub category: ToolCategory,
    pub keywords: &'static [&'static str],
    pub kind: ToolKind,
    /// Per-file upload cap in bytes for upload tools.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_limit: Option<u64>,
}

const fn formula(
    id: &'static str,
    name: &'static str,
    description: &'static str,
    category: ToolCategory,
    keywords: &'static [&'static str],
) -> ToolDescriptor {
    ToolDescriptor {
        id,
        name,
        description,
        category,
        keywords,
        kind: ToolKind::Formula,
        upload_limit: None,
    }
}

const fn upload(
    id: &'static str,
    name: &'static str,
    description: &'static str,
    category: ToolCategory,
    keywords: &'static [&'static str],
    limit: u64,
) -> ToolDescriptor {
    ToolDescriptor {
        id,
        name,
        description,
        category,
        keywords,
        kind: ToolKind::Upload,
        upload_limit: Some(limit),
    }
}

pub static TOOLS: &[ToolDescriptor] = &[
    formula(
        "calculator",
        "Calculator",
        "Evaluate arithmetic expressions",
        ToolCategory::Calculators,
        &["math", "expression", "arithmetic"],
    ),
    formula(
        "bmi",
        "BMI Calculator",
        "Body mass index from weight and height",
        ToolCategory::Health,
        &["body mass", "weight", "height"],
    ),
    formula(
        "body-fat",
        "Body Fat Calculator",
        "U.S. Navy body fat estimate from body measurements",
        ToolCategory::Health,
        &["navy", "fat", "waist", "neck"],
    ),
    formula(
        "loan-emi",
        "Loan EMI Calculator",
        "Monthly instalment, total interest and amortization",
        ToolCategory::Finance,
        &["emi", "mortgage", "instalment", "amortization"],
    ),
    formula(
        "compound-interest",
        "Compound Interest",
        "Future value of a deposit with periodic compounding",
        ToolCategory::Finance,
        &["interest", "savings", "investment"],
    ),
    ToolDescriptor {
        id: "currency-converter",
        name: "Currency Converter",
        description: "Convert amounts using current exchange rates",
        category: ToolCategory::Converters,
        keywords: &["exchange", "money", "forex", "rates"],
        kind: ToolKind::Currency,
        upload_limit: None,
    },
    formula(
        "unit-converter",
        "Unit Converter",
        "Length, weight, volume, area, speed, time and data units",
        ToolCategory::Converters,
        &["units", "length", "weight", "volume", "metric", "imperial"],
    ),
    formula(
        "temperature",
        "Temperature Converter",
        "Celsius, Fahrenheit and Kelvin",
        ToolCategory::Converters,
        &["celsius", "fahrenheit", "kelvin"],
    ),
    formula(
        "number-base",
        "Number Base Converter",
        "Binary, octal, decimal, hexadecimal and other radices",
        ToolCategory::Converters,
        &["binary", "hex", "octal", "radix"],
    ),
    formula(
        "text-case",
        "Text Case Converter",
        "Upper, lower, title, camel, snake and kebab case",
        ToolCategory::Text,
        &["uppercase", "lowercase", "camel", "snake", "kebab"],
    ),
    upload(
        "pdf-merge",
        "Merge PDF",
        "Combine several PDF files into one",
        ToolCategory::Pdf,
        &["combine", "join"],
        50 * MB,
    ),
    upload(
        "pdf-split",
        "Split PDF",
        "Split a PDF by ranges, pages or every N pages",
        ToolCategory::Pdf,
        &["separate", "extract", "pages"],
        50 * MB,
    ),
    upload(
        "pdf-info",
        "PDF Info",
        "Page count, size and title of a PDF",
        ToolCategory::Pdf,
        &["metadata", "pages"],
        50 * MB,
    ),
    upload(
        "image-resize",
        "Resize Image",
        "Change image dimensions",
        ToolCategory::Image,
        &["scale", "dimensions", "crop"],
        10 * MB,
    ),
    upload(
        "image-compress",
        "Compress Image",
        "Reduce image file size",
        ToolCategory::Image,
        &["optimize", "quality", "shrink"],
        20 * MB,
    ),
    upload(
        "audio-cut",
        "Audio Cutter",
        "Trim audio with optional fade in and out",
        ToolCategory::Audio,
        &["trim", "mp3", "fade", "ringtone"],
        100 * MB,
    ),
];

/// Look up a tool by id.
pub fn find(id: &str) -> Option<&'static ToolDescriptor> {
    TOOLS.iter().find(|t| t.id == id)
}

/// An inline answer computed straight from the search query.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickAnswer {
    pub tool_id: &'static str,
    pub display: String,
    pub result: String,
}

/// Fuzzy search over the catalog.
pub struct ToolCatalog {
    matcher: SkimMatcherV2,
}

impl Default for ToolCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolCatalog {
    pub fn new() -> Self {
        Self {
            matcher: SkimMatcherV2::default().ignore_case(),
        }
    }

    fn match_score(&self, tool: &ToolDescriptor, query: &str) -> Option<i64> {
        let name = self.matcher.fuzzy_match(tool.name, query);
        let id = self.matcher.fuzzy_match(tool.id, query);
        let keywords = tool
            .keywords
            .iter()
            .filter_map(|k| self.matcher.fuzzy_match(k, query))
            .max();
        // Description hits count for less than name or keyword hits.
        let description = self
            .matcher
            .fuzzy_match(tool.description, query)
            .map(|s| s / 2);

        [name, id, keywords, description].into_iter().flatten().max()
    }

    /// Tools matching `query` in `category`, best first.
    ///
    /// An empty query lists the whole (filtered) catalog ordered by usage.
    /// `usage` maps tool ids to frecency scores.
    pub fn search(
        &self,
        query: &str,
        category: Option<ToolCategory>,
        usage: &HashMap<String, f64>,
    ) -> Vec<&'static ToolDescriptor> {
        let query = query.trim();
        let mut hits: Vec<(f64, &'static ToolDescriptor)> = TOOLS
            .iter()
            .filter(|t| category.map_or(true, |c| t.category == c))
            .filter_map(|t| {
                let boost = usage.get(t.id).copied().unwrap_or(0.0);
                if query.is_empty() {
                    Some((boost, t))
                } else {
                    self.match_score(t, query)
                        .map(|score| (score as f64 + boost * 0.5, t))
                }
            })
            .collect();

        hits.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.name.cmp(b.1.name)));
        hits.into_iter().map(|(_, t)| t).collect()
    }

    /// Try to answer the query directly as arithmetic or a unit conversion.
    pub fn quick_answer(&self, query: &str) -> Option<QuickAnswer> {
        if let Some(conversion) = units::convert_query(query) {
            return Some(QuickAnswer {
                tool_id: "unit-converter",
                display: conversion.display(),
                result: conversion.result(),
            });
        }

        let value = calculator::evaluate(query).ok()?;
        Some(QuickAnswer {
            tool_id: "calculator",
            display: query.trim().to_string(),
            result: format!("= {}", calculator::format_result(value)),
        })
    }
}
