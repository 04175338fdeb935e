//! Static-table classifiers: disposable domains, free-mail domains and
//! role-account usernames.
//!
//! Lookups run against an immutable [`ClassifierTables`] snapshot. Refreshing
//! builds a whole new snapshot and swaps the pointer, so a reader sees either
//! the old table or the new one, never a mix.

mod builtin;
mod error;

pub use error::TableError;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use parking_lot::RwLock;
use tokio::task::JoinHandle;

use crate::validator::EmailAddress;

static BUILTIN: LazyLock<Arc<ClassifierTables>> = LazyLock::new(|| {
    Arc::new(ClassifierTables::from_lists(
        builtin::DISPOSABLE_DOMAINS.iter(),
        builtin::FREE_DOMAINS.iter(),
        builtin::ROLE_NAMES.iter(),
    ))
});

/// Separators allowed between a role name and the rest of a username
/// (`sales-emea`, `support.fr`, `info+news`, `admin2`).
fn is_role_separator(c: char) -> bool {
    matches!(c, '.' | '-' | '_' | '+') || c.is_ascii_digit()
}

#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DomainFlags {
    pub disposable: bool,
    pub free: bool,
    pub role_account: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassifierTables {
    disposable: HashSet<String>,
    free: HashSet<String>,
    roles: HashSet<String>,
}

impl ClassifierTables {
    /// Tables compiled into the crate.
    pub fn builtin() -> Arc<Self> {
        Arc::clone(&BUILTIN)
    }

    pub fn from_lists<D, F, R>(disposable: D, free: F, roles: R) -> Self
    where
        D: IntoIterator,
        D::Item: AsRef<str>,
        F: IntoIterator,
        F::Item: AsRef<str>,
        R: IntoIterator,
        R::Item: AsRef<str>,
    {
        Self {
            disposable: normalize_entries(disposable),
            free: normalize_entries(free),
            roles: normalize_entries(roles),
        }
    }

    /// Reads `disposable.txt`, `free.txt` and `roles.txt` from `dir`: one
    /// entry per line, `#` starts a comment. A missing file keeps the
    /// built-in list for that table.
    pub fn load_from_dir(dir: &Path) -> Result<Self, TableError> {
        let builtin = Self::builtin();
        Ok(Self {
            disposable: read_list(&dir.join("disposable.txt"))?
                .unwrap_or_else(|| builtin.disposable.clone()),
            free: read_list(&dir.join("free.txt"))?.unwrap_or_else(|| builtin.free.clone()),
            roles: read_list(&dir.join("roles.txt"))?.unwrap_or_else(|| builtin.roles.clone()),
        })
    }

    /// Matches the domain itself and every parent domain, so
    /// `eu.mailinator.com` counts as disposable.
    pub fn is_disposable(&self, domain: &str) -> bool {
        let domain = domain.trim_end_matches('.').to_ascii_lowercase();
        parent_domains(&domain).any(|candidate| self.disposable.contains(candidate))
    }

    pub fn is_free(&self, domain: &str) -> bool {
        let domain = domain.trim_end_matches('.').to_ascii_lowercase();
        self.free.contains(&domain)
    }

    /// Case-insensitive exact match, or a role name followed by a separator.
    pub fn is_role_account(&self, username: &str) -> bool {
        let username = username.trim_matches('"').to_ascii_lowercase();
        if self.roles.contains(&username) {
            return true;
        }
        username
            .char_indices()
            .filter(|(_, c)| is_role_separator(*c))
            .any(|(idx, _)| idx > 0 && self.roles.contains(&username[..idx]))
    }

    pub fn classify(&self, address: &EmailAddress) -> DomainFlags {
        DomainFlags {
            disposable: self.is_disposable(&address.domain),
            free: self.is_free(&address.domain),
            role_account: self.is_role_account(&address.username),
        }
    }
}

fn normalize_entries<I>(entries: I) -> HashSet<String>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    entries
        .into_iter()
        .filter_map(|entry| {
            let entry = entry.as_ref().split('#').next().unwrap_or("").trim();
            (!entry.is_empty()).then(|| entry.to_ascii_lowercase())
        })
        .collect()
}

fn read_list(path: &Path) -> Result<Option<HashSet<String>>, TableError> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(Some(normalize_entries(text.lines()))),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(TableError::io(path, err)),
    }
}

fn parent_domains(domain: &str) -> impl Iterator<Item = &str> {
    std::iter::once(domain).chain(
        domain
            .match_indices('.')
            .map(move |(idx, _)| &domain[idx + 1..])
            .filter(|rest| rest.contains('.')),
    )
}

/// Where a background refresh fetches new tables from.
pub trait TableSource: Send + Sync + 'static {
    fn load(&self) -> BoxFuture<'_, Result<ClassifierTables, TableError>>;
}

/// Re-reads the list files of a directory (see [`ClassifierTables::load_from_dir`]).
#[derive(Debug, Clone)]
pub struct DirectorySource {
    dir: PathBuf,
}

impl DirectorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl TableSource for DirectorySource {
    fn load(&self) -> BoxFuture<'_, Result<ClassifierTables, TableError>> {
        let dir = self.dir.clone();
        async move {
            tokio::task::spawn_blocking(move || ClassifierTables::load_from_dir(&dir))
                .await
                .map_err(|err| TableError::Task(err.to_string()))?
        }
        .boxed()
    }
}

/// Shared handle over the current table snapshot.
#[derive(Debug)]
pub struct Classifiers {
    current: RwLock<Arc<ClassifierTables>>,
}

impl Default for Classifiers {
    fn default() -> Self {
        Self::new(ClassifierTables::builtin())
    }
}

impl Classifiers {
    pub fn new(tables: Arc<ClassifierTables>) -> Self {
        Self {
            current: RwLock::new(tables),
        }
    }

    pub fn snapshot(&self) -> Arc<ClassifierTables> {
        Arc::clone(&self.current.read())
    }

    pub fn replace(&self, tables: ClassifierTables) {
        *self.current.write() = Arc::new(tables);
    }

    pub fn classify(&self, address: &EmailAddress) -> DomainFlags {
        self.snapshot().classify(address)
    }

    /// Reloads the tables from `source` every `every`. A failed load keeps the
    /// previous snapshot.
    pub fn spawn_refresh<S: TableSource>(self: &Arc<Self>, source: S, every: Duration) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match source.load().await {
                    Ok(tables) => {
                        this.replace(tables);
                        tracing::debug!("classifier tables refreshed");
                    }
                    Err(err) => tracing::warn!(error = %err, "classifier table refresh failed"),
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn addr(s: &str) -> EmailAddress {
        s.parse().expect("valid address")
    }

    #[test]
    fn builtin_flags_disposable() {
        let flags = ClassifierTables::builtin().classify(&addr("user@mailinator.com"));
        assert!(flags.disposable);
        assert!(!flags.free);
        assert!(!flags.role_account);
    }

    #[test]
    fn disposable_matches_subdomains() {
        let tables = ClassifierTables::builtin();
        assert!(tables.is_disposable("eu.mailinator.com"));
        assert!(!tables.is_disposable("com"));
        assert!(!tables.is_disposable("notmailinator.com"));
    }

    #[test]
    fn free_is_exact() {
        let tables = ClassifierTables::builtin();
        assert!(tables.is_free("gmail.com"));
        assert!(tables.is_free("GMAIL.COM"));
        assert!(!tables.is_free("mail.gmail.com"));
    }

    #[test]
    fn role_accounts() {
        let tables = ClassifierTables::builtin();
        assert!(tables.is_role_account("sales"));
        assert!(tables.is_role_account("Support"));
        assert!(tables.is_role_account("sales-emea"));
        assert!(tables.is_role_account("admin2"));
        assert!(tables.is_role_account("info+news"));
        assert!(!tables.is_role_account("salesforce.fan"));
        assert!(!tables.is_role_account("information"));
        assert!(!tables.is_role_account("jane.doe"));
        assert!(ClassifierTables::builtin().classify(&addr("sales@knowncorp.co")).role_account);
    }

    #[test]
    fn from_lists_normalizes_entries() {
        let tables = ClassifierTables::from_lists(
            ["  Temp.Example  ", "# comment", ""],
            ["Free.Example # inline"],
            ["Ops"],
        );
        assert!(tables.is_disposable("temp.example"));
        assert!(tables.is_free("free.example"));
        assert!(tables.is_role_account("ops"));
        assert!(!tables.is_disposable("mailinator.com"));
    }

    #[test]
    fn replace_swaps_snapshot() {
        let classifiers = Classifiers::default();
        let before = classifiers.snapshot();
        classifiers.replace(ClassifierTables::from_lists(["new.example"], [""; 0], [""; 0]));
        assert!(before.is_disposable("mailinator.com"));
        assert!(!classifiers.snapshot().is_disposable("mailinator.com"));
        assert!(classifiers.snapshot().is_disposable("new.example"));
    }

    #[test]
    fn load_from_dir_falls_back_per_file() {
        let dir = std::env::temp_dir().join(format!("mailverify-tables-{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("mkdir");
        std::fs::write(dir.join("free.txt"), "corp-mail.example\n").expect("write");
        let tables = ClassifierTables::load_from_dir(&dir).expect("load");
        assert!(tables.is_free("corp-mail.example"));
        assert!(!tables.is_free("gmail.com"));
        assert!(tables.is_disposable("yopmail.com"));
        std::fs::remove_dir_all(&dir).ok();
    }

    struct CountingSource {
        loads: Arc<AtomicUsize>,
    }

    impl TableSource for CountingSource {
        fn load(&self) -> BoxFuture<'_, Result<ClassifierTables, TableError>> {
            let n = self.loads.fetch_add(1, Ordering::SeqCst);
            async move {
                Ok(ClassifierTables::from_lists(
                    [format!("gen{n}.example")],
                    [""; 0],
                    [""; 0],
                ))
            }
            .boxed()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_task_swaps_tables() {
        let classifiers = Arc::new(Classifiers::default());
        let loads = Arc::new(AtomicUsize::new(0));
        let handle = classifiers.spawn_refresh(
            CountingSource {
                loads: Arc::clone(&loads),
            },
            Duration::from_secs(60),
        );

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert!(classifiers.snapshot().is_disposable("gen0.example"));
        handle.abort();
    }
}
