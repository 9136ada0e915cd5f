//! Object name validation and free-name generation.

use crate::error::{Result, StorageError};

/// Characters libvirt rejects in storage object names.
const FORBIDDEN_CHARS: &[char] = &[' '];

/// Upper bound on numbered candidates tried by [`generate_name`].
const MAX_NAME_ATTEMPTS: u32 = 100_000;

/// Reject names libvirt is known not to accept.
pub fn validate_generic_name(label: &str, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(StorageError::InvalidName(format!(
            "A name must be specified for the {}",
            label
        )));
    }

    if let Some(c) = FORBIDDEN_CHARS.iter().find(|c| name.contains(**c)) {
        return Err(StorageError::InvalidName(format!(
            "{} name '{}' can not contain '{}' character.",
            label, name, c
        )));
    }

    Ok(())
}

/// Options for [`generate_name`].
#[derive(Debug, Clone)]
pub struct NameOptions {
    /// Appended after the number, e.g. ".qcow2"
    pub suffix: String,
    /// First number tried
    pub start_num: u32,
    /// Separator between base and number
    pub sep: String,
    /// Never try the bare base name
    pub force_num: bool,
}

impl Default for NameOptions {
    fn default() -> Self {
        Self {
            suffix: String::new(),
            start_num: 1,
            sep: "-".to_string(),
            force_num: false,
        }
    }
}

impl NameOptions {
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    pub fn force_num(mut self) -> Self {
        self.force_num = true;
        self
    }
}

/// Find the first name derived from `base` for which `collides` is false.
///
/// Candidates are `base`, `base-1`, `base-2`, ... (each followed by the
/// suffix).
pub fn generate_name<F>(base: &str, mut collides: F, options: &NameOptions) -> Result<String>
where
    F: FnMut(&str) -> bool,
{
    let numbered = (options.start_num..options.start_num.saturating_add(MAX_NAME_ATTEMPTS)).map(Some);
    let bare = if options.force_num { None } else { Some(None) };

    for num in bare.into_iter().chain(numbered) {
        let candidate = match num {
            Some(n) => format!("{}{}{}{}", base, options.sep, n, options.suffix),
            None => format!("{}{}", base, options.suffix),
        };
        if !collides(&candidate) {
            return Ok(candidate);
        }
    }

    Err(StorageError::Internal(format!(
        "Could not find a free name based on '{}'",
        base
    )))
}
