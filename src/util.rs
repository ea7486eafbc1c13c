use std::cmp::Ordering;
use std::sync::OnceLock;

use regex::Regex;

/// Trailing uuid of an entity URN such as `urn:vcloud:org:<uuid>`.
pub fn uuid_from_urn(urn: &str) -> &str {
    urn.rsplit(':').next().unwrap_or(urn)
}

/// Split a composite import id into exactly `parts` pieces.
pub fn split_import_id<'a>(
    id: &'a str,
    separator: &str,
    parts: &[&str],
) -> Result<Vec<&'a str>, String> {
    let pieces: Vec<&str> = id.splitn(parts.len(), separator).collect();
    if pieces.len() != parts.len() || pieces.iter().any(|p| p.is_empty()) {
        return Err(format!(
            "import id '{id}' must have the form {}",
            parts.join(separator)
        ));
    }
    Ok(pieces)
}

pub fn sanitize_error(error: &str) -> String {
    error
        .lines()
        .map(|line| {
            let lower = line.to_ascii_lowercase();
            if lower.contains("password") || lower.contains("token") {
                "Authentication failed (credentials redacted)".to_string()
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Compare dotted numeric versions, padding the shorter one with zeros.
pub fn compare_versions(a: &str, b: &str) -> Option<Ordering> {
    let parse = |v: &str| {
        v.split('.')
            .map(|part| part.trim().parse::<u64>().ok())
            .collect::<Option<Vec<_>>>()
    };
    let (a, b) = (parse(a)?, parse(b)?);

    let len = a.len().max(b.len());
    for i in 0..len {
        let x = a.get(i).copied().unwrap_or(0);
        let y = b.get(i).copied().unwrap_or(0);
        match x.cmp(&y) {
            Ordering::Equal => continue,
            other => return Some(other),
        }
    }
    Some(Ordering::Equal)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// A condition like `>= 40.0` checked against an API version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionCondition {
    pub operator: Operator,
    pub version: String,
}

impl VersionCondition {
    pub fn parse(condition: &str) -> Result<Self, String> {
        static PATTERN: OnceLock<Regex> = OnceLock::new();
        let pattern = PATTERN.get_or_init(|| {
            Regex::new(r"^\s*(>=|<=|==|!=|>|<|=)?\s*(\d+(?:\.\d+)*)\s*$")
                .expect("version condition pattern is valid")
        });

        let captures = pattern.captures(condition).ok_or_else(|| {
            format!("invalid version condition '{condition}', expected e.g. '>= 40.0'")
        })?;
        // A bare version, "=" and "==" all mean equality.
        let operator = match captures.get(1).map_or("==", |m| m.as_str()) {
            "!=" => Operator::Ne,
            "<" => Operator::Lt,
            "<=" => Operator::Le,
            ">" => Operator::Gt,
            ">=" => Operator::Ge,
            _ => Operator::Eq,
        };

        Ok(Self {
            operator,
            version: captures[2].to_string(),
        })
    }

    /// `None` when `version` is not a dotted numeric version.
    pub fn matches(&self, version: &str) -> Option<bool> {
        let ordering = compare_versions(version, &self.version)?;
        Some(match self.operator {
            Operator::Eq => ordering == Ordering::Equal,
            Operator::Ne => ordering != Ordering::Equal,
            Operator::Lt => ordering == Ordering::Less,
            Operator::Le => ordering != Ordering::Greater,
            Operator::Gt => ordering == Ordering::Greater,
            Operator::Ge => ordering != Ordering::Less,
        })
    }
}
