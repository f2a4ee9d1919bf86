//! Rule set indexing.
//!
//! A [`RuleSet`] groups compiled rules by the document path they define and
//! keeps a package tree over those paths. The evaluator walks the tree to
//! decide whether a reference names a virtual document, a package prefix
//! (an object merging everything beneath it) or a base document.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::ast::{Rule, RuleKind};
use crate::error::{EvalError, EvalResult};
use crate::term::Ref;

/// All rules defining one document, in declaration order.
#[derive(Debug, Clone)]
pub struct RuleGroup {
    kind: RuleKind,
    path: Ref,
    rules: Vec<Arc<Rule>>,
    default: Option<Arc<Rule>>,
    arity: usize,
}

impl RuleGroup {
    /// Kind shared by every rule in the group.
    #[must_use]
    pub const fn kind(&self) -> RuleKind {
        self.kind
    }

    /// Ground `data` path of the group.
    #[must_use]
    pub const fn path(&self) -> &Ref {
        &self.path
    }

    /// Non-default rules in declaration order.
    #[must_use]
    pub fn rules(&self) -> &[Arc<Rule>] {
        &self.rules
    }

    /// The `default` rule, if one was declared.
    #[must_use]
    pub fn default_rule(&self) -> Option<&Arc<Rule>> {
        self.default.as_ref()
    }

    /// Number of parameters; zero unless this group defines a function.
    #[must_use]
    pub const fn arity(&self) -> usize {
        self.arity
    }
}

/// A node of the package tree.
#[derive(Debug, Default)]
pub struct PackageNode {
    children: BTreeMap<String, PackageNode>,
    group: Option<Arc<RuleGroup>>,
}

impl PackageNode {
    /// Child package or document named `name`.
    #[must_use]
    pub fn child(&self, name: &str) -> Option<&PackageNode> {
        self.children.get(name)
    }

    /// Child packages and documents in name order.
    pub fn children(&self) -> impl Iterator<Item = (&str, &PackageNode)> {
        self.children.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// The rules defined at exactly this path.
    #[must_use]
    pub fn group(&self) -> Option<&Arc<RuleGroup>> {
        self.group.as_ref()
    }
}

/// Result of resolving a ground path against the package tree.
#[derive(Debug)]
pub enum PathLookup<'a> {
    /// The path, or a prefix of it, is defined by rules. `consumed` counts
    /// the segments that name the rule document.
    Rules {
        /// Rules at the matched path.
        group: &'a Arc<RuleGroup>,
        /// Number of path segments naming the rule document.
        consumed: usize,
    },
    /// The path is a package prefix of at least one rule.
    Package(&'a PackageNode),
    /// No rule lives at or beneath the path.
    Absent,
}

/// Validated, indexed collection of compiled rules.
#[derive(Debug, Default)]
pub struct RuleSet {
    root: PackageNode,
    by_name: HashMap<String, Arc<RuleGroup>>,
}

struct PendingGroup {
    kind: RuleKind,
    path: Ref,
    segments: Vec<String>,
    rules: Vec<Arc<Rule>>,
    default: Option<Arc<Rule>>,
    arity: usize,
}

impl RuleSet {
    /// Validates and indexes `rules`.
    ///
    /// # Errors
    /// Returns a validation error when a rule path is not a ground
    /// `data.<string>...` reference, when rules of different kinds or
    /// arities share a path, when a path has more than one default rule or
    /// a default on a non-complete rule, or when one rule path is a prefix
    /// of another.
    pub fn new(rules: impl IntoIterator<Item = Rule>) -> EvalResult<Self> {
        let mut pending: Vec<PendingGroup> = Vec::new();
        let mut index: HashMap<Vec<String>, usize> = HashMap::new();

        for rule in rules {
            let segments = validate_rule(&rule)?;
            let slot = match index.get(&segments) {
                Some(&slot) => slot,
                None => {
                    index.insert(segments.clone(), pending.len());
                    pending.push(PendingGroup {
                        kind: rule.kind,
                        path: rule.path.clone(),
                        segments,
                        rules: Vec::new(),
                        default: None,
                        arity: rule.args.len(),
                    });
                    pending.len() - 1
                }
            };
            let group = &mut pending[slot];
            if group.kind != rule.kind {
                return Err(EvalError::validation(format!(
                    "rules for {} mix kinds {} and {}",
                    group.path, group.kind, rule.kind
                )));
            }
            if group.arity != rule.args.len() {
                return Err(EvalError::validation(format!(
                    "function {} declared with {} and {} arguments",
                    group.path,
                    group.arity,
                    rule.args.len()
                )));
            }
            if rule.default {
                if group.default.is_some() {
                    return Err(EvalError::validation(format!(
                        "multiple default rules for {}",
                        group.path
                    )));
                }
                group.default = Some(Arc::new(rule));
            } else {
                group.rules.push(Arc::new(rule));
            }
        }

        let mut set = Self::default();
        for group in pending {
            set.insert(group)?;
        }
        Ok(set)
    }

    fn insert(&mut self, pending: PendingGroup) -> EvalResult<()> {
        let group = Arc::new(RuleGroup {
            kind: pending.kind,
            path: pending.path,
            rules: pending.rules,
            default: pending.default,
            arity: pending.arity,
        });

        let mut node = &mut self.root;
        for segment in &pending.segments {
            if node.group.is_some() {
                return Err(EvalError::validation(format!(
                    "rule {} is nested beneath another rule",
                    group.path
                )));
            }
            node = node.children.entry(segment.clone()).or_default();
        }
        if node.group.is_some() || !node.children.is_empty() {
            return Err(EvalError::validation(format!(
                "rule {} overlaps another rule path",
                group.path
            )));
        }
        node.group = Some(Arc::clone(&group));
        self.by_name.insert(group.path.to_string(), group);
        Ok(())
    }

    /// Root of the package tree (`data`).
    #[must_use]
    pub const fn root(&self) -> &PackageNode {
        &self.root
    }

    /// Resolves the string segments after `data`.
    #[must_use]
    pub fn lookup<S: AsRef<str>>(&self, path: &[S]) -> PathLookup<'_> {
        let mut node = &self.root;
        for (i, segment) in path.iter().enumerate() {
            if let Some(group) = &node.group {
                return PathLookup::Rules { group, consumed: i };
            }
            match node.children.get(segment.as_ref()) {
                Some(child) => node = child,
                None => return PathLookup::Absent,
            }
        }
        match &node.group {
            Some(group) => PathLookup::Rules {
                group,
                consumed: path.len(),
            },
            None if path.is_empty() || !node.children.is_empty() => PathLookup::Package(node),
            None => PathLookup::Absent,
        }
    }

    /// Candidate rules for a `data` reference, if its ground prefix names a rule document.
    #[must_use]
    pub fn rules_for(&self, reference: &Ref) -> Option<&Arc<RuleGroup>> {
        let mut segments = Vec::new();
        for term in reference.terms().iter().skip(1) {
            match term.as_str() {
                Some(s) => segments.push(s),
                None => break,
            }
        }
        match self.lookup(&segments) {
            PathLookup::Rules { group, .. } => Some(group),
            _ => None,
        }
    }

    /// Looks up a function by its qualified name, e.g. `data.lib.allowed`.
    #[must_use]
    pub fn function(&self, name: &str) -> Option<&Arc<RuleGroup>> {
        self.by_name
            .get(name)
            .filter(|g| g.kind == RuleKind::Function)
    }

    /// Number of distinct rule documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// True when no rule was added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

fn validate_rule(rule: &Rule) -> EvalResult<Vec<String>> {
    let is_data = matches!(rule.path.head(), Some(crate::term::Term::Var(v)) if v.name() == "data");
    let segments = rule.path.string_path().filter(|s| is_data && !s.is_empty());
    let Some(segments) = segments else {
        return Err(EvalError::validation(format!(
            "rule path {} must be data followed by string segments",
            rule.path
        )));
    };

    if rule.default && (rule.kind != RuleKind::Complete || !rule.body.is_empty()) {
        return Err(EvalError::validation(format!(
            "default rule {} must be a complete rule without a body",
            rule.path
        )));
    }
    if rule.kind != RuleKind::Function && !rule.args.is_empty() {
        return Err(EvalError::validation(format!(
            "rule {} declares arguments but is not a function",
            rule.path
        )));
    }
    if matches!(rule.kind, RuleKind::PartialSet | RuleKind::PartialObject) {
        if rule.key.is_none() {
            return Err(EvalError::validation(format!(
                "partial rule {} has no key",
                rule.path
            )));
        }
        if rule.else_rule.is_some() {
            return Err(EvalError::validation(format!(
                "partial rule {} cannot have else branches",
                rule.path
            )));
        }
    }
    Ok(segments)
}
