//! `.env`-backed credential store.
//!
//! The access token lives on an `ACCESS_TOKEN=` line next to the other
//! secrets so a restarted process picks it up through `dotenvy`. The issue
//! time goes on an `ACCESS_TOKEN_CREATED_AT=` line.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::domain::mask_secret;
use crate::error::{AuthError, Error, Result};
use crate::port::outbound::credential::{AuthArchive, CredentialStore, StoredToken};

const TOKEN_KEY: &str = "ACCESS_TOKEN";
const CREATED_KEY: &str = "ACCESS_TOKEN_CREATED_AT";
const TOKEN_LEN: usize = 32;

/// [`CredentialStore`] writing to an env file and a directory of JSON
/// archives.
pub struct EnvFileCredentialStore {
    env_path: PathBuf,
    archive_dir: PathBuf,
}

impl EnvFileCredentialStore {
    pub fn new(env_path: impl Into<PathBuf>, archive_dir: impl Into<PathBuf>) -> Self {
        Self {
            env_path: env_path.into(),
            archive_dir: archive_dir.into(),
        }
    }

    #[must_use]
    pub fn env_path(&self) -> &Path {
        &self.env_path
    }

    fn read(&self) -> Result<Option<String>> {
        match fs::read_to_string(&self.env_path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write_atomic(&self, content: &str) -> Result<()> {
        if let Some(parent) = self.env_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut tmp = self.env_path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, content)?;
        restrict_permissions(&tmp)?;
        fs::rename(&tmp, &self.env_path)?;
        Ok(())
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

/// Value of `key` in env-file syntax, without surrounding quotes.
fn lookup<'a>(content: &'a str, key: &str) -> Option<&'a str> {
    content.lines().find_map(|line| {
        let line = line.trim();
        let line = line.strip_prefix("export ").unwrap_or(line);
        let (k, v) = line.split_once('=')?;
        (k.trim() == key).then(|| v.trim().trim_matches(|c| c == '"' || c == '\''))
    })
}

/// Replace the first `key=` line, or append one. Later `key=` lines are dropped.
fn upsert(content: &str, key: &str, value: &str) -> String {
    let entry = format!("{key}={value}");
    let mut found = false;
    let mut lines: Vec<String> = content
        .lines()
        .filter_map(|line| {
            let bare = line.trim_start();
            let bare = bare.strip_prefix("export ").unwrap_or(bare);
            let matches = bare
                .split_once('=')
                .is_some_and(|(k, _)| k.trim() == key);
            match (matches, found) {
                (false, _) => Some(line.to_string()),
                (true, true) => None,
                (true, false) => {
                    found = true;
                    Some(entry.clone())
                }
            }
        })
        .collect();
    if !found {
        lines.push(entry);
    }
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

impl CredentialStore for EnvFileCredentialStore {
    fn load(&self) -> Result<Option<StoredToken>> {
        let Some(content) = self.read()? else {
            return Ok(None);
        };
        let Some(token) = lookup(&content, TOKEN_KEY).filter(|t| !t.is_empty()) else {
            return Ok(None);
        };
        let issued_at = lookup(&content, CREATED_KEY)
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|dt| dt.with_timezone(&Utc));
        Ok(Some(StoredToken {
            access_token: token.to_string(),
            issued_at,
        }))
    }

    fn save(&self, access_token: &str, issued_at: DateTime<Utc>) -> Result<()> {
        if access_token.len() != TOKEN_LEN
            || !access_token.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return Err(Error::Auth(AuthError::InvalidAccessToken(format!(
                "expected {TOKEN_LEN} alphanumeric characters, got {}",
                access_token.len()
            ))));
        }
        let content = self.read()?.unwrap_or_default();
        let content = upsert(&content, TOKEN_KEY, access_token);
        let content = upsert(&content, CREATED_KEY, &issued_at.to_rfc3339());
        self.write_atomic(&content)?;
        info!(
            path = %self.env_path.display(),
            token = %mask_secret(access_token),
            "Access token saved"
        );
        Ok(())
    }

    fn archive(&self, record: &AuthArchive) -> Result<PathBuf> {
        fs::create_dir_all(&self.archive_dir)?;
        let name = format!(
            "auth_{}_{}_{}.json",
            record.mode,
            record.status,
            record.finished_at.format("%Y%m%d_%H%M%S")
        );
        let path = self.archive_dir.join(name);
        fs::write(&path, serde_json::to_vec_pretty(record)?)?;
        debug!(path = %path.display(), "Auth session archived");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AuthStatus, TradingMode};
    use chrono::TimeZone;
    use tempfile::TempDir;

    const TOKEN: &str = "abcdefghijklmnopqrstuvwxyz012345";

    fn store(dir: &TempDir) -> EnvFileCredentialStore {
        EnvFileCredentialStore::new(dir.path().join(".env"), dir.path().join("auth_data"))
    }

    #[test]
    fn missing_file_means_no_token() {
        let dir = TempDir::new().unwrap();
        assert_eq!(store(&dir).load().unwrap(), None);
    }

    #[test]
    fn save_replaces_existing_line_and_keeps_others() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        fs::write(
            store.env_path(),
            "ZAPI_KEY=key\nACCESS_TOKEN=\"old\"\nTELEGRAM_CHAT_ID=42\n",
        )
        .unwrap();

        let at = Utc.with_ymd_and_hms(2025, 1, 6, 4, 0, 0).unwrap();
        store.save(TOKEN, at).unwrap();

        let content = fs::read_to_string(store.env_path()).unwrap();
        assert!(content.contains("ZAPI_KEY=key"));
        assert!(content.contains("TELEGRAM_CHAT_ID=42"));
        assert_eq!(content.matches("ACCESS_TOKEN=").count(), 1);
        assert!(!dir.path().join(".env.tmp").exists());

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.access_token, TOKEN);
        assert_eq!(loaded.issued_at, Some(at));
    }

    #[test]
    fn save_drops_duplicate_token_lines() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        fs::write(
            store.env_path(),
            "ACCESS_TOKEN=first\nZAPI_KEY=key\nexport ACCESS_TOKEN=second\nACCESS_TOKEN = third\n",
        )
        .unwrap();

        store.save(TOKEN, Utc::now()).unwrap();

        let content = fs::read_to_string(store.env_path()).unwrap();
        assert!(content.starts_with(&format!("ACCESS_TOKEN={TOKEN}\n")));
        assert!(content.contains("ZAPI_KEY=key"));
        assert!(!content.contains("second"));
        assert!(!content.contains("third"));
        assert_eq!(store.load().unwrap().unwrap().access_token, TOKEN);
    }

    #[test]
    fn rejects_wrong_length() {
        let dir = TempDir::new().unwrap();
        let err = store(&dir).save("short", Utc::now()).unwrap_err();
        assert!(matches!(err, Error::Auth(AuthError::InvalidAccessToken(_))));
        assert!(!dir.path().join(".env").exists());
    }

    #[cfg(unix)]
    #[test]
    fn file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.save(TOKEN, Utc::now()).unwrap();
        let mode = fs::metadata(store.env_path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn archive_is_named_by_mode_and_status() {
        let dir = TempDir::new().unwrap();
        let at = Utc.with_ymd_and_hms(2025, 1, 6, 4, 0, 0).unwrap();
        let record = AuthArchive {
            state: "s1".into(),
            mode: TradingMode::Paper,
            status: AuthStatus::Completed,
            created_at: at,
            finished_at: at,
            user_id: Some("AB1234".into()),
            token_preview: Some(mask_secret(TOKEN)),
            error: None,
        };
        let path = store(&dir).archive(&record).unwrap();
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "auth_paper_completed_20250106_040000.json"
        );
        let body = fs::read_to_string(path).unwrap();
        assert!(body.contains("abcdefgh..."));
        assert!(!body.contains(TOKEN));
    }

    #[test]
    fn lookup_handles_export_and_quotes() {
        let content = "export ACCESS_TOKEN='tok'\n# ACCESS_TOKEN_CREATED_AT=x\n";
        assert_eq!(lookup(content, "ACCESS_TOKEN"), Some("tok"));
        assert_eq!(lookup(content, "ACCESS_TOKEN_CREATED_AT"), None);
    }
}
