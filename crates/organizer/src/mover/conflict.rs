use crate::error::{ErrorKind, Result};
use blamite_storage::BackendHandle;
use exn::ResultExt;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// Highest numeric suffix tried before bailing with [`ErrorKind::Collision`].
const MAX_COLLISION_SUFFIX: u32 = 10_000;

/// Finds a name for `name` inside `dir` that nothing occupies yet.
///
/// The name itself is used when free. Otherwise `_1`, `_2`, … is inserted
/// before the extension (`a.pdf` → `a_1.pdf`), counting up from 1 until a
/// free name turns up, so the result only depends on what the directory
/// already contains.
///
/// Checking and then using the name is not atomic. Two movers racing for the
/// same name in the same directory can both pick it; the organizer owns the
/// destination tree, so that window is accepted.
pub(crate) async fn free_destination(backend: &BackendHandle, dir: &Path, name: &OsStr) -> Result<PathBuf> {
    let target = dir.join(name);
    if !backend.exists(&target).await.or_raise(|| ErrorKind::Storage)? {
        return Ok(target);
    }
    let name = name.to_string_lossy();
    let (stem, suffix) = blamite_storage::split_name(&name);
    for n in 1..=MAX_COLLISION_SUFFIX {
        let numbered = dir.join(format!("{stem}_{n}{suffix}"));
        if !backend.exists(&numbered).await.or_raise(|| ErrorKind::Storage)? {
            return Ok(numbered);
        }
    }
    exn::bail!(ErrorKind::Collision(target));
}
