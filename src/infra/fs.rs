//! Filesystem infrastructure — destination canonicalization and the atomic
//! writer.

use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};

/// Resolve a destination to its canonical form for whitelist checking.
///
/// The destination may not exist yet (a new file has nothing to resolve), so
/// the deepest existing ancestor is canonicalized — resolving `.`/`..` and
/// symlinks — and the non-existing remainder is re-appended. Any `.` or `..`
/// component in that remainder is rejected: it could not be resolved against
/// the real filesystem and would otherwise smuggle a traversal past the
/// whitelist.
///
/// # Errors
///
/// Returns an error if the path is relative, no ancestor exists, or the
/// unresolved remainder contains dot components.
pub fn canonicalize_destination(dest: &Path) -> Result<PathBuf> {
    anyhow::ensure!(
        dest.is_absolute(),
        "destination must be absolute: {}",
        dest.display()
    );

    if dest.exists() {
        return std::fs::canonicalize(dest)
            .with_context(|| format!("canonicalizing {}", dest.display()));
    }

    let existing = dest
        .ancestors()
        .find(|a| a.exists())
        .context("no existing ancestor for destination")?;
    let canonical_base = std::fs::canonicalize(existing)
        .with_context(|| format!("canonicalizing {}", existing.display()))?;

    let remainder = dest
        .strip_prefix(existing)
        .with_context(|| format!("stripping ancestor from {}", dest.display()))?;
    anyhow::ensure!(
        remainder
            .components()
            .all(|c| matches!(c, Component::Normal(_))),
        "destination {} contains unresolvable '.' or '..' components",
        dest.display()
    );

    Ok(canonical_base.join(remainder))
}

/// Read a destination's current content for diffing, tolerating non-UTF-8
/// bytes in a pre-existing file. Returns `None` when the file does not exist.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read.
pub fn read_text_lossy(path: &Path) -> Result<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
}

/// Deploy one validated file atomically: write to a `.tmp` sibling, set mode
/// and ownership on the sibling, then rename it onto the destination. The
/// rename is the atomicity boundary — a reader of `dest` never observes a
/// partially-written file.
///
/// Missing parent directories are created; the destination has already
/// passed the whitelist, so its parents are inside the whitelist too.
///
/// # Errors
///
/// Returns an error if any step fails. On failure the destination is
/// untouched; a stale `.tmp` sibling may remain.
pub fn deploy_file(
    source: &Path,
    dest: &Path,
    mode: u32,
    owner: Option<(u32, u32)>,
) -> Result<()> {
    let content =
        std::fs::read(source).with_context(|| format!("reading source {}", source.display()))?;

    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating directory {}", parent.display()))?;
    }

    let tmp = tmp_sibling(dest)?;
    std::fs::write(&tmp, &content).with_context(|| format!("writing {}", tmp.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(mode))
            .with_context(|| format!("setting mode on {}", tmp.display()))?;
        if let Some((uid, gid)) = owner {
            std::os::unix::fs::chown(&tmp, Some(uid), Some(gid))
                .with_context(|| format!("setting owner on {}", tmp.display()))?;
        }
    }
    #[cfg(not(unix))]
    {
        let _ = (mode, owner);
    }

    std::fs::rename(&tmp, dest)
        .with_context(|| format!("renaming {} onto {}", tmp.display(), dest.display()))?;
    Ok(())
}

fn tmp_sibling(dest: &Path) -> Result<PathBuf> {
    let name = dest
        .file_name()
        .with_context(|| format!("destination has no file name: {}", dest.display()))?;
    let mut tmp_name = name.to_os_string();
    tmp_name.push(".tmp");
    Ok(dest.with_file_name(tmp_name))
}

/// Resolve a `user:group` pair to numeric ids via the host's user database.
///
/// # Errors
///
/// Returns an error if either name is unknown.
#[cfg(unix)]
pub fn resolve_owner(user: &str, group: &str) -> Result<(u32, u32)> {
    let uid = nix::unistd::User::from_name(user)
        .with_context(|| format!("looking up user {user}"))?
        .with_context(|| format!("unknown user {user}"))?
        .uid
        .as_raw();
    let gid = nix::unistd::Group::from_name(group)
        .with_context(|| format!("looking up group {group}"))?
        .with_context(|| format!("unknown group {group}"))?
        .gid
        .as_raw();
    Ok((uid, gid))
}

/// `user:group` string for the invoking identity. Lets tests build manifests
/// whose chown is a no-op regardless of privilege.
///
/// # Errors
///
/// Returns an error if the current uid/gid cannot be resolved to names.
#[cfg(unix)]
pub fn current_owner_string() -> Result<String> {
    let user = nix::unistd::User::from_uid(nix::unistd::getuid())
        .context("looking up current user")?
        .context("current uid has no passwd entry")?;
    let group = nix::unistd::Group::from_gid(nix::unistd::getgid())
        .context("looking up current group")?
        .context("current gid has no group entry")?;
    Ok(format!("{}:{}", user.name, group.name))
}

// ── Unit tests ───────────────────────────────────────────────────────────────
