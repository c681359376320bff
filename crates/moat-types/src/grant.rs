//! Capability grants and their set algebra.
//!
//! A [`GrantSet`] lists what a single plugin may do, split into five
//! optional categories. `None` and an empty rule list both mean
//! "nothing granted".
//!
//! Set operations compare rules by exact structural equality. They answer
//! "is this literal rule already present", not "would this request be
//! authorised": `"*.example.com"` does not contain `"api.example.com"` here,
//! even though a policy engine would accept the latter at request time.

use serde::{Deserialize, Serialize};

/// Key-value store access mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KvOperation {
    /// Read-only access.
    Read,
    /// Write-only access.
    Write,
    /// Read and write access.
    ReadWrite,
}

impl KvOperation {
    /// Returns `true` if a grant of `self` authorises `requested`.
    pub fn permits(self, requested: KvOperation) -> bool {
        self == requested || self == KvOperation::ReadWrite
    }

    /// Returns `true` if this mode allows mutation.
    pub fn is_write(self) -> bool {
        matches!(self, KvOperation::Write | KvOperation::ReadWrite)
    }
}

/// A network rule: any host in `hosts` on any port in `ports`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkRule {
    /// Host patterns: literal names, `*.suffix`, CIDR blocks, or `*`.
    #[serde(default)]
    pub hosts: Vec<String>,
    /// Port patterns: literal ports, `lo-hi` ranges, or `*`.
    #[serde(default)]
    pub ports: Vec<String>,
}

impl NetworkRule {
    /// Creates a rule from host and port patterns.
    pub fn new<H, P>(hosts: H, ports: P) -> Self
    where
        H: IntoIterator,
        H::Item: Into<String>,
        P: IntoIterator,
        P::Item: Into<String>,
    {
        Self {
            hosts: hosts.into_iter().map(Into::into).collect(),
            ports: ports.into_iter().map(Into::into).collect(),
        }
    }
}

/// A filesystem rule with separate read and write path patterns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSystemRule {
    /// Path patterns readable by the plugin.
    #[serde(default)]
    pub read: Vec<String>,
    /// Path patterns writable by the plugin.
    #[serde(default)]
    pub write: Vec<String>,
}

/// A key-value rule granting `operation` on keys matching `keys`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValueRule {
    /// Key patterns.
    #[serde(default)]
    pub keys: Vec<String>,
    /// Granted access mode.
    pub operation: KvOperation,
}

/// Network grants.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkGrants {
    #[serde(default)]
    pub rules: Vec<NetworkRule>,
}

/// Filesystem grants.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSystemGrants {
    #[serde(default)]
    pub rules: Vec<FileSystemRule>,
}

/// Environment variable grants.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentGrants {
    #[serde(default)]
    pub variables: Vec<String>,
}

/// Process execution grants.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecGrants {
    #[serde(default)]
    pub commands: Vec<String>,
}

/// Key-value store grants.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValueGrants {
    #[serde(default)]
    pub rules: Vec<KeyValueRule>,
}

/// Everything a single plugin has been authorised to do.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<NetworkGrants>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filesystem: Option<FileSystemGrants>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<EnvironmentGrants>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exec: Option<ExecGrants>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_value: Option<KeyValueGrants>,
}

impl GrantSet {
    /// Creates an empty grant set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a network rule.
    pub fn allow_network<H, P>(mut self, hosts: H, ports: P) -> Self
    where
        H: IntoIterator,
        H::Item: Into<String>,
        P: IntoIterator,
        P::Item: Into<String>,
    {
        self.network
            .get_or_insert_with(NetworkGrants::default)
            .rules
            .push(NetworkRule::new(hosts, ports));
        self
    }

    /// Adds a filesystem rule granting read access to `paths`.
    pub fn allow_read<I>(mut self, paths: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.filesystem
            .get_or_insert_with(FileSystemGrants::default)
            .rules
            .push(FileSystemRule {
                read: paths.into_iter().map(Into::into).collect(),
                write: Vec::new(),
            });
        self
    }

    /// Adds a filesystem rule granting write access to `paths`.
    pub fn allow_write<I>(mut self, paths: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.filesystem
            .get_or_insert_with(FileSystemGrants::default)
            .rules
            .push(FileSystemRule {
                read: Vec::new(),
                write: paths.into_iter().map(Into::into).collect(),
            });
        self
    }

    /// Grants access to environment variables.
    pub fn allow_env<I>(mut self, variables: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.environment
            .get_or_insert_with(EnvironmentGrants::default)
            .variables
            .extend(variables.into_iter().map(Into::into));
        self
    }

    /// Grants permission to execute commands.
    pub fn allow_exec<I>(mut self, commands: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.exec
            .get_or_insert_with(ExecGrants::default)
            .commands
            .extend(commands.into_iter().map(Into::into));
        self
    }

    /// Adds a key-value rule.
    pub fn allow_key_value<I>(mut self, keys: I, operation: KvOperation) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.key_value
            .get_or_insert_with(KeyValueGrants::default)
            .rules
            .push(KeyValueRule {
                keys: keys.into_iter().map(Into::into).collect(),
                operation,
            });
        self
    }

    /// Returns `true` if no category grants anything.
    pub fn is_empty(&self) -> bool {
        is_category_empty(&self.network)
            && is_category_empty(&self.filesystem)
            && is_category_empty(&self.environment)
            && is_category_empty(&self.exec)
            && is_category_empty(&self.key_value)
    }

    /// Like [`GrantSet::is_empty`], treating a missing grant set as empty.
    pub fn is_empty_opt(grants: Option<&GrantSet>) -> bool {
        grants.map_or(true, GrantSet::is_empty)
    }

    /// Unions two grant sets category by category.
    ///
    /// Order is preserved (`self` first). Rules structurally equal to one
    /// already collected are skipped, so merging is idempotent.
    pub fn merge(&self, other: &GrantSet) -> GrantSet {
        GrantSet {
            network: merge_category(&self.network, &other.network),
            filesystem: merge_category(&self.filesystem, &other.filesystem),
            environment: merge_category(&self.environment, &other.environment),
            exec: merge_category(&self.exec, &other.exec),
            key_value: merge_category(&self.key_value, &other.key_value),
        }
    }

    /// Returns the rules of `self` that are not literally present in `other`.
    pub fn difference(&self, other: &GrantSet) -> GrantSet {
        GrantSet {
            network: difference_category(&self.network, &other.network),
            filesystem: difference_category(&self.filesystem, &other.filesystem),
            environment: difference_category(&self.environment, &other.environment),
            exec: difference_category(&self.exec, &other.exec),
            key_value: difference_category(&self.key_value, &other.key_value),
        }
    }

    /// Returns `true` if every rule of `other` is literally present in `self`.
    pub fn contains(&self, other: &GrantSet) -> bool {
        other.difference(self).is_empty()
    }
}

/// Uniform access to the rule list backing each category.
trait RuleList {
    type Item: Clone + PartialEq;

    fn items(&self) -> &[Self::Item];
    fn from_items(items: Vec<Self::Item>) -> Self;
}

macro_rules! impl_rule_list {
    ($ty:ty, $field:ident, $item:ty) => {
        impl RuleList for $ty {
            type Item = $item;

            fn items(&self) -> &[Self::Item] {
                &self.$field
            }

            fn from_items(items: Vec<Self::Item>) -> Self {
                Self { $field: items }
            }
        }
    };
}

impl_rule_list!(NetworkGrants, rules, NetworkRule);
impl_rule_list!(FileSystemGrants, rules, FileSystemRule);
impl_rule_list!(EnvironmentGrants, variables, String);
impl_rule_list!(ExecGrants, commands, String);
impl_rule_list!(KeyValueGrants, rules, KeyValueRule);

fn items_of<C: RuleList>(category: &Option<C>) -> &[C::Item] {
    match category {
        Some(c) => c.items(),
        None => &[],
    }
}

fn is_category_empty<C: RuleList>(category: &Option<C>) -> bool {
    items_of(category).is_empty()
}

fn merge_category<C: RuleList>(a: &Option<C>, b: &Option<C>) -> Option<C> {
    if a.is_none() && b.is_none() {
        return None;
    }
    let mut merged: Vec<C::Item> = Vec::with_capacity(items_of(a).len() + items_of(b).len());
    for item in items_of(a).iter().chain(items_of(b)) {
        if !merged.contains(item) {
            merged.push(item.clone());
        }
    }
    Some(C::from_items(merged))
}

fn difference_category<C: RuleList>(a: &Option<C>, b: &Option<C>) -> Option<C> {
    let theirs = items_of(b);
    let remaining: Vec<C::Item> = items_of(a)
        .iter()
        .filter(|item| !theirs.contains(item))
        .cloned()
        .collect();
    if remaining.is_empty() {
        None
    } else {
        Some(C::from_items(remaining))
    }
}
