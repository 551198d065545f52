//! Currency codes and the free-text alias registry

use anyhow::{Context, Result, anyhow};
use regex::Regex;
use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub enum CurrencyCode {
    Rur,
    Usd,
    Gel,
}

impl CurrencyCode {
    pub const ALL: [CurrencyCode; 3] = [CurrencyCode::Rur, CurrencyCode::Usd, CurrencyCode::Gel];

    pub fn as_str(&self) -> &'static str {
        match self {
            CurrencyCode::Rur => "RUR",
            CurrencyCode::Usd => "USD",
            CurrencyCode::Gel => "GEL",
        }
    }
}

impl Display for CurrencyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CurrencyCode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "RUR" => Ok(CurrencyCode::Rur),
            "USD" => Ok(CurrencyCode::Usd),
            "GEL" => Ok(CurrencyCode::Gel),
            _ => Err(anyhow!("Unknown currency code: {}", s)),
        }
    }
}

/// Static description of one supported currency.
#[derive(Debug, Clone)]
pub struct CurrencySpec {
    pub code: CurrencyCode,
    pub symbol: &'static str,
    pub aliases: &'static [&'static str],
}

/// Pattern rule consulted when no alias matches exactly.
#[derive(Debug, Clone)]
pub struct PatternSpec {
    pub pattern: &'static str,
    pub code: CurrencyCode,
}

pub const DEFAULT_CURRENCIES: &[CurrencySpec] = &[
    CurrencySpec {
        code: CurrencyCode::Rur,
        symbol: "₽",
        aliases: &["р", "₽", "r", "rub", "rur"],
    },
    CurrencySpec {
        code: CurrencyCode::Usd,
        symbol: "$",
        aliases: &["$", "usd", "долл"],
    },
    CurrencySpec {
        code: CurrencyCode::Gel,
        symbol: "₾",
        aliases: &["л", "₾", "ლ", "лар", "лари", "gel"],
    },
];

pub const DEFAULT_PATTERNS: &[PatternSpec] = &[
    PatternSpec {
        pattern: "^р.*",
        code: CurrencyCode::Rur,
    },
    PatternSpec {
        pattern: "^л.*",
        code: CurrencyCode::Gel,
    },
    PatternSpec {
        pattern: "^д.*",
        code: CurrencyCode::Usd,
    },
];

/// Lookup tables built once at startup and shared read-only afterwards.
#[derive(Debug)]
pub struct CurrencyRegistry {
    specs: Vec<CurrencySpec>,
    aliases: HashMap<String, CurrencyCode>,
    patterns: Vec<(Regex, CurrencyCode)>,
}

impl CurrencyRegistry {
    pub fn new(specs: &[CurrencySpec], patterns: &[PatternSpec]) -> Result<Self> {
        let mut aliases = HashMap::new();
        for spec in specs {
            if spec.aliases.is_empty() {
                anyhow::bail!("Currency {} has no aliases", spec.code);
            }
            for alias in spec.aliases {
                aliases.insert(alias.to_lowercase(), spec.code);
            }
        }

        let patterns = patterns
            .iter()
            .filter(|p| specs.iter().any(|s| s.code == p.code))
            .map(|p| {
                Regex::new(p.pattern)
                    .with_context(|| format!("Invalid currency pattern: {}", p.pattern))
                    .map(|re| (re, p.code))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            specs: specs.to_vec(),
            aliases,
            patterns,
        })
    }

    /// Resolves a user supplied token such as `$`, `лари` or `usd`.
    pub fn normalize(&self, token: &str) -> Option<CurrencyCode> {
        let token = token.trim().to_lowercase();

        if let Some(code) = self.aliases.get(&token) {
            return Some(*code);
        }
        if let Some((_, code)) = self.patterns.iter().find(|(re, _)| re.is_match(&token)) {
            return Some(*code);
        }

        token
            .parse::<CurrencyCode>()
            .ok()
            .filter(|code| self.spec(*code).is_some())
    }

    pub fn describe(&self, code: CurrencyCode) -> String {
        match self.spec(code) {
            Some(spec) => format!("{} ({})", spec.symbol, code),
            None => code.to_string(),
        }
    }

    /// Like [`describe`](Self::describe) but for raw strings; unknown codes come back unchanged.
    pub fn describe_token(&self, code: &str) -> String {
        match code.parse::<CurrencyCode>() {
            Ok(code) if self.spec(code).is_some() => self.describe(code),
            _ => code.to_string(),
        }
    }

    pub fn help_text(&self) -> String {
        let parts: Vec<String> = self
            .specs
            .iter()
            .map(|spec| format!("{}: {}", spec.symbol, self.aliases_of(spec.code).join(", ")))
            .collect();

        let mut text = format!("Supported currencies and aliases: {}", parts.join(" | "));
        if !self.patterns.is_empty() {
            let hints: Vec<String> = self
                .patterns
                .iter()
                .map(|(re, code)| format!("{} => {}", re.as_str().trim_start_matches('^'), code))
                .collect();
            text.push_str(&format!("; regex: {}", hints.join(", ")));
        }
        text
    }

    /// Sorted aliases that resolve to `code`.
    pub fn aliases_of(&self, code: CurrencyCode) -> Vec<&str> {
        let mut aliases: Vec<&str> = self
            .aliases
            .iter()
            .filter(|(_, c)| **c == code)
            .map(|(alias, _)| alias.as_str())
            .collect();
        aliases.sort();
        aliases
    }

    pub fn codes(&self) -> impl Iterator<Item = CurrencyCode> + '_ {
        self.specs.iter().map(|s| s.code)
    }

    fn spec(&self, code: CurrencyCode) -> Option<&CurrencySpec> {
        self.specs.iter().find(|s| s.code == code)
    }
}

/// Other side of a conversion when the caller names only one currency.
pub fn default_counter(code: CurrencyCode) -> CurrencyCode {
    match code {
        CurrencyCode::Usd | CurrencyCode::Gel => CurrencyCode::Rur,
        _ => CurrencyCode::Usd,
    }
}

impl Default for CurrencyRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_CURRENCIES, DEFAULT_PATTERNS)
            .expect("built-in currency tables are valid")
    }
}
