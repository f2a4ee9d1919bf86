//! Semantic version builtins (SemVer 2.0.0).

use std::cmp::Ordering;
use std::sync::OnceLock;

use regex::Regex;

use crate::builtins::{string_operand, Builtin, BuiltinContext, BuiltinError, BuiltinRegistry};
use crate::term::Term;

const SEMVER_PATTERN: &str = r"^(0|[1-9]\d*)\.(0|[1-9]\d*)\.(0|[1-9]\d*)(?:-((?:0|[1-9]\d*|\d*[a-zA-Z-][0-9a-zA-Z-]*)(?:\.(?:0|[1-9]\d*|\d*[a-zA-Z-][0-9a-zA-Z-]*))*))?(?:\+([0-9a-zA-Z-]+(?:\.[0-9a-zA-Z-]+)*))?$";

fn pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(SEMVER_PATTERN).ok()).as_ref()
}

#[derive(Debug, PartialEq, Eq)]
struct Version {
    major: u64,
    minor: u64,
    patch: u64,
    pre: Vec<String>,
}

impl Version {
    fn parse(s: &str) -> Option<Self> {
        let caps = pattern()?.captures(s)?;
        let num = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u64>().ok());
        Some(Self {
            major: num(1)?,
            minor: num(2)?,
            patch: num(3)?,
            pre: caps
                .get(4)
                .map(|m| m.as_str().split('.').map(str::to_string).collect())
                .unwrap_or_default(),
        })
    }
}

fn compare_identifiers(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch)
            .cmp(&(other.major, other.minor, other.patch))
            .then_with(|| match (self.pre.is_empty(), other.pre.is_empty()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                (false, false) => {
                    for (a, b) in self.pre.iter().zip(&other.pre) {
                        let ord = compare_identifiers(a, b);
                        if ord != Ordering::Equal {
                            return ord;
                        }
                    }
                    self.pre.len().cmp(&other.pre.len())
                }
            })
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn is_valid(_: &BuiltinContext, args: &[Term]) -> Result<Option<Term>, BuiltinError> {
    let valid = args[0].as_str().is_some_and(|s| Version::parse(s).is_some());
    Ok(Some(Term::Bool(valid)))
}

fn compare(_: &BuiltinContext, args: &[Term]) -> Result<Option<Term>, BuiltinError> {
    let parse = |operand: usize| -> Result<Version, BuiltinError> {
        let s = string_operand("semver.compare", operand, &args[operand - 1])?;
        Version::parse(s).ok_or_else(|| {
            BuiltinError::failed(
                "semver.compare",
                format!("operand {operand}: string {s:?} is not a valid SemVer"),
            )
        })
    };
    let a = parse(1)?;
    let b = parse(2)?;
    let n = match a.cmp(&b) {
        Ordering::Less => -1,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    };
    Ok(Some(Term::number(n)))
}

pub(super) fn register(registry: &mut BuiltinRegistry) {
    registry.register(Builtin::simple("semver.is_valid", 1, is_valid));
    registry.register(Builtin::simple("semver.compare", 2, compare));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::call;

    fn cmp(a: &str, b: &str) -> Term {
        call("semver.compare", &[Term::string(a), Term::string(b)])
            .unwrap()
            .unwrap()
    }

    #[test]
    fn validity() {
        for ok in ["1.0.0", "0.1.2-alpha.1", "1.2.3+build.5", "10.20.30-rc.1+meta"] {
            assert_eq!(call("semver.is_valid", &[Term::string(ok)]).unwrap(), Some(Term::Bool(true)), "{ok}");
        }
        for bad in ["1.0", "01.0.0", "1.0.0-", "v1.0.0"] {
            assert_eq!(call("semver.is_valid", &[Term::string(bad)]).unwrap(), Some(Term::Bool(false)), "{bad}");
        }
        assert_eq!(call("semver.is_valid", &[Term::number(1)]).unwrap(), Some(Term::Bool(false)));
    }

    #[test]
    fn precedence_follows_semver() {
        assert_eq!(cmp("1.0.0", "2.0.0"), Term::number(-1));
        assert_eq!(cmp("1.0.0", "1.0.0+build"), Term::number(0));
        assert_eq!(cmp("1.0.0-alpha", "1.0.0"), Term::number(-1));
        assert_eq!(cmp("1.0.0-alpha.1", "1.0.0-alpha"), Term::number(1));
        assert_eq!(cmp("1.0.0-alpha.2", "1.0.0-alpha.10"), Term::number(-1));
        assert_eq!(cmp("1.0.0-1", "1.0.0-alpha"), Term::number(-1));
        assert_eq!(cmp("1.0.0-rc.1", "1.0.0-beta.11"), Term::number(1));
    }

    #[test]
    fn invalid_versions_fail_without_type_error() {
        let err = call("semver.compare", &[Term::string("nope"), Term::string("1.0.0")]).unwrap_err();
        assert!(matches!(err, BuiltinError::Failed { .. }));
        let err = call("semver.compare", &[Term::string("1.0.0"), Term::number(1)]).unwrap_err();
        assert!(matches!(err, BuiltinError::Type { operand: 2, .. }));
    }
}
