// ABOUTME: Shell command construction shared by the sandbox providers
// ABOUTME: Quoting, path resolution, file listing and the fallback file write

/// Directories never reported by `list_files`
pub const EXCLUDED_DIRS: &[&str] = &["node_modules", ".git", "dist", "build", ".next", ".vite"];

/// Dev server log file used when the backend has no background execution flag
pub const DEV_SERVER_LOG: &str = "/tmp/vite.log";

/// Linux MAX_ARG_STRLEN: one argv string, terminating NUL included
pub const MAX_SHELL_ARG_BYTES: usize = 128 * 1024;

/// Quote a string for POSIX sh using single quotes
pub fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Resolve a sandbox path against the project root
///
/// Absolute paths are kept as-is; relative paths (with or without a leading
/// `./`) are joined onto `root`.
pub fn resolve_path(root: &str, path: &str) -> String {
    if path.starts_with('/') {
        return path.to_string();
    }
    let relative = path.trim_start_matches("./").trim_start_matches('/');
    if relative.is_empty() || relative == "." {
        root.to_string()
    } else {
        format!("{}/{}", root.trim_end_matches('/'), relative)
    }
}

/// Directory component of an absolute path, if it has one beyond `/`
pub fn parent_dir(path: &str) -> Option<&str> {
    match path.trim_end_matches('/').rfind('/') {
        Some(0) | None => None,
        Some(idx) => Some(&path[..idx]),
    }
}

pub fn is_excluded(relative_path: &str) -> bool {
    relative_path
        .split('/')
        .any(|segment| EXCLUDED_DIRS.contains(&segment))
}

/// `find` invocation listing regular files under `dir`, relative to it
pub fn list_files_command(dir: &str) -> String {
    let prunes: Vec<String> = EXCLUDED_DIRS
        .iter()
        .map(|name| format!("-not -path {}", quote(&format!("*/{}/*", name))))
        .collect();
    format!("cd {} && find . -type f {}", quote(dir), prunes.join(" "))
}

/// Parse `find` output into sorted relative paths, dropping excluded directories
pub fn parse_file_listing(stdout: &str) -> Vec<String> {
    let mut files: Vec<String> = stdout
        .lines()
        .map(|line| line.trim())
        .map(|line| line.trim_start_matches("./"))
        .filter(|line| !line.is_empty() && *line != ".")
        .filter(|line| !is_excluded(line))
        .map(str::to_string)
        .collect();
    files.sort();
    files.dedup();
    files
}

/// Shell command that writes `content` to `path`, creating parent directories
///
/// The whole command travels as a single argv string, so NUL bytes cannot be
/// represented and anything at or over [`MAX_SHELL_ARG_BYTES`] would be refused
/// by the kernel with E2BIG. Both are rejected here with a readable reason.
pub fn fallback_write_command(path: &str, content: &str) -> Result<String, String> {
    if content.contains('\0') {
        return Err("content contains NUL bytes and cannot be written through the shell".to_string());
    }

    let write = format!("printf '%s' {} > {}", quote(content), quote(path));
    let command = match parent_dir(path) {
        Some(dir) => format!("mkdir -p {} && {}", quote(dir), write),
        None => write,
    };

    if command.len() >= MAX_SHELL_ARG_BYTES {
        return Err(format!(
            "content is too large for the shell fallback: command is {} bytes, argument limit is {} bytes",
            command.len(),
            MAX_SHELL_ARG_BYTES
        ));
    }
    Ok(command)
}

/// Run `command` detached from the caller, logging to `log_path`
pub fn nohup_command(command: &str, log_path: &str) -> String {
    format!(
        "nohup sh -c {} > {} 2>&1 &",
        quote(command),
        quote(log_path)
    )
}

/// Kill any running dev server, succeeding when none is running
///
/// The bracketed pattern keeps pkill from matching the `sh -c` running it.
pub fn kill_dev_server_command() -> &'static str {
    "pkill -f '[v]ite' || true"
}

/// `npm install` with flags and packages, each argument quoted
pub fn npm_install_command(flags: &[String], packages: &[String]) -> String {
    let mut parts = vec!["npm".to_string(), "install".to_string()];
    parts.extend(flags.iter().map(|f| quote(f)));
    parts.extend(packages.iter().map(|p| quote(p)));
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_quote_escapes_single_quotes() {
        assert_eq!(quote("plain"), "'plain'");
        assert_eq!(quote("it's"), r"'it'\''s'");
    }

    #[test]
    fn test_resolve_path() {
        assert_eq!(resolve_path("/home/user/app", "src/App.jsx"), "/home/user/app/src/App.jsx");
        assert_eq!(resolve_path("/home/user/app/", "./index.html"), "/home/user/app/index.html");
        assert_eq!(resolve_path("/home/user/app", "/tmp/x.log"), "/tmp/x.log");
        assert_eq!(resolve_path("/home/user/app", "."), "/home/user/app");
    }

    #[test]
    fn test_parent_dir() {
        assert_eq!(parent_dir("/app/a/b.txt"), Some("/app/a"));
        assert_eq!(parent_dir("/file.txt"), None);
        assert_eq!(parent_dir("file.txt"), None);
    }

    #[test]
    fn test_parse_file_listing_filters_and_sorts() {
        let stdout = "./src/main.jsx\n./node_modules/react/index.js\n./index.html\n\
                      ./.git/HEAD\n./dist/assets/app.js\n./src/App.jsx\n.\n";
        assert_eq!(
            parse_file_listing(stdout),
            vec![
                "index.html".to_string(),
                "src/App.jsx".to_string(),
                "src/main.jsx".to_string(),
            ]
        );
    }

    #[test]
    fn test_excluded_segment_must_match_exactly() {
        assert!(is_excluded("packages/node_modules/x.js"));
        assert!(is_excluded("build/out.js"));
        assert!(!is_excluded("src/builders/form.js"));
        assert!(!is_excluded("docs/git-notes.md"));
    }

    #[test]
    fn test_list_files_command_prunes_excluded_dirs() {
        let cmd = list_files_command("/vercel/sandbox");
        assert!(cmd.starts_with("cd '/vercel/sandbox' && find . -type f"));
        assert!(cmd.contains("-not -path '*/node_modules/*'"));
        assert!(cmd.contains("-not -path '*/.git/*'"));
    }

    #[test]
    fn test_fallback_write_command() {
        let cmd = fallback_write_command("/app/src/a.txt", "it's \"quoted\" $HOME").unwrap();
        assert_eq!(
            cmd,
            r#"mkdir -p '/app/src' && printf '%s' 'it'\''s "quoted" $HOME' > '/app/src/a.txt'"#
        );
        assert!(fallback_write_command("/app/a.bin", "a\0b").is_err());
    }

    #[test]
    fn test_fallback_write_rejects_content_over_arg_limit() {
        let content = "a".repeat(MAX_SHELL_ARG_BYTES);
        let reason = fallback_write_command("/app/src/big.txt", &content).unwrap_err();
        assert!(reason.contains("too large"), "{}", reason);
        assert!(reason.contains(&MAX_SHELL_ARG_BYTES.to_string()), "{}", reason);

        let fits = "a".repeat(MAX_SHELL_ARG_BYTES - 100);
        let cmd = fallback_write_command("/app/src/big.txt", &fits).unwrap();
        assert!(cmd.len() < MAX_SHELL_ARG_BYTES);
    }

    #[test]
    fn test_kill_dev_server_pattern_skips_own_shell() {
        let cmd = kill_dev_server_command();
        assert_eq!(cmd, "pkill -f '[v]ite' || true");
        // The command line running pkill must not itself match the pattern
        assert!(!cmd.contains("vite"));
    }

    #[test]
    fn test_npm_install_command() {
        let cmd = npm_install_command(
            &["--legacy-peer-deps".to_string()],
            &["react-icons".to_string(), "@heroicons/react".to_string()],
        );
        assert_eq!(cmd, "npm install '--legacy-peer-deps' 'react-icons' '@heroicons/react'");
    }

    #[test]
    fn test_nohup_command() {
        assert_eq!(
            nohup_command("npm run dev", DEV_SERVER_LOG),
            "nohup sh -c 'npm run dev' > '/tmp/vite.log' 2>&1 &"
        );
    }
}
