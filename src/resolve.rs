use std::env;
use std::ffi::CString;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

use crate::error::StageError;

/// Everything a child needs to replace its image, prepared before `fork`
/// so the child does not have to allocate.
#[derive(Debug)]
pub struct Invocation {
    pub name: String,
    pub program: CString,
    pub argv: Vec<CString>,
    pub not_found_msg: Vec<u8>,
    pub exec_failed_msg: Vec<u8>,
}

impl Invocation {
    /// Maps an argument vector to an invocation. Names without a slash are
    /// looked up on `PATH`; unknown names are passed through so the exec
    /// reports the failure in the child.
    pub fn prepare(args: &[String]) -> Result<Self, StageError> {
        let name = args.first().ok_or(StageError::Empty)?.clone();
        let program = if name.contains('/') {
            name.clone()
        } else {
            full_path(&name).unwrap_or_else(|| name.clone())
        };
        let argv = args
            .iter()
            .map(|a| CString::new(a.as_str()))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            program: CString::new(program)?,
            argv,
            not_found_msg: format!("osh: {}: command not found\n", name).into_bytes(),
            exec_failed_msg: format!("osh: {}: cannot execute\n", name).into_bytes(),
            name,
        })
    }
}

/// Finds the full path of a command by searching PATH.
pub fn full_path(command: &str) -> Option<String> {
    env::var("PATH").ok()?.split(':').find_map(|path| {
        let full = format!("{}/{}", path, command);
        std::fs::metadata(&full).ok().filter(|m| {
            m.is_file() && {
                #[cfg(unix)]
                {
                    m.permissions().mode() & 0o111 != 0
                }
                #[cfg(not(unix))]
                {
                    true
                }
            }
        })?;
        Some(full)
    })
}
