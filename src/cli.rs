use clap::Parser;
use std::ffi::OsString;

use crate::utils::error::{AppError, AppResult};

/// Mode switches recognised on the command line.
///
/// Flags are presence-only and matched case-insensitively; see
/// [`Invocation::parse`] for the normalisation applied before clap sees them.
#[derive(Parser, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[command(name = "shotkeeper")]
#[command(no_binary_name = true, disable_help_flag = true, disable_version_flag = true)]
pub struct ModeFlags {
    /// Allow this process to run next to an existing instance
    #[arg(short = 'm', long = "multi")]
    pub multi: bool,

    /// Suppress first-run prompts
    #[arg(short = 's', long = "silent")]
    pub silent: bool,

    /// Disable every kind of persistence
    #[arg(long = "sandbox")]
    pub sandbox: bool,

    /// Keep personal data beside the executable
    #[arg(short = 'p', long = "portable")]
    pub portable: bool,
}

/// Process-wide mode, fixed once at start.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ProcessMode {
    pub multi_instance: bool,
    pub portable: bool,
    pub silent: bool,
    pub sandbox: bool,
}

impl From<ModeFlags> for ProcessMode {
    fn from(flags: ModeFlags) -> Self {
        Self {
            multi_instance: flags.multi,
            // Sandbox wins over portable: there is no personal path to place.
            portable: flags.portable && !flags.sandbox,
            silent: flags.silent,
            sandbox: flags.sandbox,
        }
    }
}

/// The parsed command line of this launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub mode: ProcessMode,
    /// Arguments that are not mode flags, in their original order.
    pub passthrough: Vec<String>,
}

impl Invocation {
    pub fn parse<I, S>(args: I) -> AppResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut flags: Vec<&'static str> = Vec::new();
        let mut passthrough = Vec::new();

        for arg in args.into_iter().map(Into::into) {
            match canonical_flag(&arg) {
                Some(flag) => {
                    if !flags.contains(&flag) {
                        flags.push(flag);
                    }
                }
                None => passthrough.push(arg),
            }
        }

        let parsed = ModeFlags::try_parse_from(flags.iter().copied())
            .map_err(|e| AppError::System(format!("Failed to parse mode flags: {}", e)))?;

        Ok(Self {
            mode: parsed.into(),
            passthrough,
        })
    }
}

/// Command-line arguments as text. File names that are not valid Unicode are
/// converted lossily rather than rejected.
pub fn lossy_args<I>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = OsString>,
{
    args.into_iter()
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect()
}

/// Map `-M`, `--Multi`, `/multi` (Windows) and friends to the clap spelling.
fn canonical_flag(arg: &str) -> Option<&'static str> {
    let name = if let Some(rest) = arg.strip_prefix("--") {
        rest
    } else if let Some(rest) = arg.strip_prefix('-') {
        rest
    } else if cfg!(windows) {
        arg.strip_prefix('/')?
    } else {
        return None;
    };

    match name.to_lowercase().as_str() {
        "multi" | "m" => Some("--multi"),
        "silent" | "s" => Some("--silent"),
        "sandbox" => Some("--sandbox"),
        "portable" | "p" => Some("--portable"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[cfg(unix)]
    #[test]
    fn test_non_unicode_argument_is_passed_through() {
        use std::os::unix::ffi::OsStringExt;

        let args = lossy_args([
            OsString::from("--multi"),
            OsString::from_vec(vec![0xff, b'.', b'p', b'n', b'g']),
        ]);
        let invocation = Invocation::parse(args).unwrap();

        assert!(invocation.mode.multi_instance);
        assert_eq!(invocation.passthrough, vec!["\u{fffd}.png".to_string()]);
    }

    #[test]
    fn test_empty_args() {
        let invocation = Invocation::parse(Vec::<String>::new()).unwrap();
        assert_eq!(invocation.mode, ProcessMode::default());
        assert!(invocation.passthrough.is_empty());
    }

    #[test]
    fn test_flags_are_case_insensitive() {
        let invocation = Invocation::parse(["--MULTI", "-S", "--Sandbox"]).unwrap();
        assert!(invocation.mode.multi_instance);
        assert!(invocation.mode.silent);
        assert!(invocation.mode.sandbox);
        assert!(!invocation.mode.portable);
    }

    #[test]
    fn test_short_and_long_forms() {
        let short = Invocation::parse(["-p", "-m"]).unwrap();
        let long = Invocation::parse(["--portable", "--multi"]).unwrap();
        assert_eq!(short.mode, long.mode);
        assert!(short.mode.portable);
    }

    #[test]
    fn test_single_dash_long_form() {
        let invocation = Invocation::parse(["-portable"]).unwrap();
        assert!(invocation.mode.portable);
    }

    #[test]
    fn test_unrecognized_args_pass_through_in_order() {
        let invocation = Invocation::parse(["foo.png", "--multi", "--upload", "bar.txt"]).unwrap();
        assert!(invocation.mode.multi_instance);
        assert_eq!(
            invocation.passthrough,
            vec!["foo.png".to_string(), "--upload".to_string(), "bar.txt".to_string()]
        );
    }

    #[test]
    fn test_repeated_flag_is_accepted() {
        let invocation = Invocation::parse(["-m", "--multi", "-M"]).unwrap();
        assert!(invocation.mode.multi_instance);
        assert!(invocation.passthrough.is_empty());
    }

    #[test]
    fn test_sandbox_overrides_portable() {
        let invocation = Invocation::parse(["--sandbox", "--portable"]).unwrap();
        assert!(invocation.mode.sandbox);
        assert!(!invocation.mode.portable);
    }
}
