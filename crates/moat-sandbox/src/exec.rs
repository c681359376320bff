//! Dangerous command detection.
//!
//! [`classify`] flags invocations that hand arbitrary code to a shell or
//! an interpreter. It is advisory input for risk scoring and policy
//! decisions, not a sandbox: a determined guest can always find a program
//! this table does not know.

use std::fmt;

/// Shell basenames.
pub const SHELLS: &[&str] = &["sh", "bash", "dash", "zsh", "ksh", "csh", "tcsh", "fish"];

/// Interpreters and the flags that make them execute inline code.
///
/// Names are compared after lowercasing and stripping trailing version
/// suffixes (`python3.12` -> `python`).
const INTERPRETER_FLAGS: &[(&str, &[&str])] = &[
    ("python", &["-c", "--command"]),
    ("pypy", &["-c"]),
    ("perl", &["-e", "-E"]),
    ("ruby", &["-e"]),
    ("node", &["-e", "--eval", "-p", "--print"]),
    ("nodejs", &["-e", "--eval", "-p", "--print"]),
    ("deno", &["eval"]),
    ("bun", &["-e", "--eval"]),
    ("php", &["-r"]),
    ("lua", &["-e"]),
    ("luajit", &["-e"]),
    ("rscript", &["-e"]),
    ("tclsh", &["-c"]),
    ("pwsh", &["-c", "-command"]),
    ("powershell", &["-c", "-command"]),
];

/// AWK variants take their program as a positional argument.
const AWK_FAMILY: &[&str] = &["awk", "gawk", "mawk", "nawk"];

const AWK_CODE_PREFIXES: &[&str] = &["BEGIN{", "BEGIN {", "END{", "END {"];

/// Flags treated as code execution on commands not in any table.
const UNIVERSAL_CODE_FLAGS: &[&str] = &["-c", "-e", "-E", "-r", "--eval", "--command"];

/// Outcome of [`classify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecClass {
    /// Nothing suspicious detected.
    Safe,
    /// A shell invoked with arguments.
    Shell,
    /// A known interpreter asked to run inline code.
    Interpreter,
    /// An unknown command carrying a code-execution style flag.
    Suspicious,
}

impl ExecClass {
    /// Returns `true` for anything other than [`ExecClass::Safe`].
    pub fn is_dangerous(self) -> bool {
        self != ExecClass::Safe
    }
}

impl fmt::Display for ExecClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Safe => "safe",
            Self::Shell => "shell",
            Self::Interpreter => "interpreter",
            Self::Suspicious => "suspicious",
        };
        f.write_str(name)
    }
}

/// Classifies a command invocation.
pub fn classify<S: AsRef<str>>(command: &str, args: &[S]) -> ExecClass {
    let name = basename(command);

    if is_shell(&name) && !args.is_empty() {
        return ExecClass::Shell;
    }

    if AWK_FAMILY.contains(&name.as_str()) {
        let inline = args.iter().any(|arg| {
            let arg = arg.as_ref().trim();
            AWK_CODE_PREFIXES.iter().any(|p| arg.starts_with(p))
        });
        return if inline {
            ExecClass::Interpreter
        } else {
            ExecClass::Safe
        };
    }

    if let Some(flags) = interpreter_flags(&name) {
        let inline = args
            .iter()
            .any(|arg| flags.iter().any(|flag| arg.as_ref().starts_with(flag)));
        return if inline {
            ExecClass::Interpreter
        } else {
            ExecClass::Safe
        };
    }

    if args
        .iter()
        .any(|arg| UNIVERSAL_CODE_FLAGS.contains(&arg.as_ref()))
    {
        return ExecClass::Suspicious;
    }

    ExecClass::Safe
}

/// Convenience wrapper: `true` unless [`classify`] returns `Safe`.
pub fn is_dangerous<S: AsRef<str>>(command: &str, args: &[S]) -> bool {
    let class = classify(command, args);
    if class.is_dangerous() {
        tracing::debug!(command = %command, class = %class, "dangerous invocation detected");
    }
    class.is_dangerous()
}

/// Returns `true` if `name` (already a basename) is a known shell.
pub fn is_shell(name: &str) -> bool {
    SHELLS.contains(&name)
}

/// Returns `true` if `name` (already a basename) is a known interpreter.
pub fn is_interpreter(name: &str) -> bool {
    AWK_FAMILY.contains(&name) || interpreter_flags(name).is_some()
}

/// Lowercased final path component of `command`, without `.exe`.
pub fn basename(command: &str) -> String {
    let last = command
        .trim()
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    match last.strip_suffix(".exe") {
        Some(stripped) => stripped.to_string(),
        None => last,
    }
}

fn interpreter_flags(name: &str) -> Option<&'static [&'static str]> {
    let lookup = |n: &str| {
        INTERPRETER_FLAGS
            .iter()
            .find(|(interp, _)| *interp == n)
            .map(|(_, flags)| *flags)
    };
    lookup(name).or_else(|| lookup(name.trim_end_matches(|c: char| c.is_ascii_digit() || c == '.')))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basename_strips_path_and_exe() {
        assert_eq!(basename("/usr/bin/bash"), "bash");
        assert_eq!(basename("C:\\Python\\python.exe"), "python");
        assert_eq!(basename("Node"), "node");
    }

    #[test]
    fn versioned_interpreter_is_recognised() {
        assert!(is_interpreter("python3"));
        assert!(is_interpreter("python3.12"));
        assert!(is_interpreter("lua5.4"));
        assert!(!is_interpreter("ls"));
    }

    #[test]
    fn bare_shell_without_args_is_safe() {
        assert_eq!(classify::<&str>("bash", &[]), ExecClass::Safe);
    }

    #[test]
    fn prefixed_flag_counts() {
        assert_eq!(
            classify("python", &["-cprint(1)"]),
            ExecClass::Interpreter
        );
        assert_eq!(
            classify("node", &["--eval=process.exit(1)"]),
            ExecClass::Interpreter
        );
    }

    #[test]
    fn exec_class_display() {
        assert_eq!(ExecClass::Interpreter.to_string(), "interpreter");
    }
}
