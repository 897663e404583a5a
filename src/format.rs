//! Format table for registry entries.
//!
//! Every specification format the registry understands is a `SpecFormat`
//! variant plus one row in `FORMAT_SPECS`. The row names the registry `type`
//! string and, for legacy formats, the source grammar the conversion pipeline
//! drives. Callers ask the table instead of comparing type strings so a new
//! input format is added in one place.

use crate::deadline::Deadline;
use crate::model::{ApiModel, SourceDocument};
use crate::raml::RamlGrammar;
use crate::registry::RegistryEntry;
use serde::Serialize;
use std::fmt;
use std::path::Path;

/// Boxed error returned by grammar stages; the pipeline records its message.
pub type GrammarError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SpecFormat {
    OpenApi,
    Raml,
}

impl SpecFormat {
    pub fn as_str(&self) -> &'static str {
        self.spec().type_name
    }

    /// Canonical formats are served as-is; everything else is converted.
    pub fn is_canonical(&self) -> bool {
        self.spec().grammar.is_none()
    }

    /// Grammar used to parse and resolve documents of this format.
    pub fn grammar(&self) -> Option<&'static dyn SourceGrammar> {
        self.spec().grammar
    }

    /// Look up a format by its registry `type` string.
    pub fn from_type_name(value: &str) -> Option<Self> {
        FORMAT_SPECS
            .iter()
            .find(|spec| spec.type_name == value)
            .map(|spec| spec.format)
    }

    fn spec(&self) -> &'static FormatSpec {
        FORMAT_SPECS
            .iter()
            .find(|spec| spec.format == *self)
            .unwrap_or(&FORMAT_SPECS[0])
    }
}

impl fmt::Display for SpecFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse and resolve stages for one legacy input format.
///
/// Grammars turn raw text into a `SourceDocument` and then into the
/// format-neutral `ApiModel`; serialization to the canonical format is shared.
pub trait SourceGrammar: Send + Sync {
    fn name(&self) -> &'static str;

    fn parse(&self, text: &str, origin: &Path) -> Result<SourceDocument, GrammarError>;

    fn resolve(&self, document: SourceDocument, deadline: &Deadline)
    -> Result<ApiModel, GrammarError>;
}

/// True iff the entry must be converted before a viewer can load it.
pub fn needs_conversion(entry: &RegistryEntry) -> bool {
    !entry.format.is_canonical()
}

/// Registry `type` strings in table order, for error messages.
pub fn known_type_names() -> Vec<&'static str> {
    FORMAT_SPECS.iter().map(|spec| spec.type_name).collect()
}

struct FormatSpec {
    format: SpecFormat,
    type_name: &'static str,
    grammar: Option<&'static dyn SourceGrammar>,
}

// The first row is the canonical format.
const FORMAT_SPECS: &[FormatSpec] = &[
    FormatSpec {
        format: SpecFormat::OpenApi,
        type_name: "openapi",
        grammar: None,
    },
    FormatSpec {
        format: SpecFormat::Raml,
        type_name: "raml",
        grammar: Some(&RamlGrammar),
    },
];
