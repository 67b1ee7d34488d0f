use super::BuiltinCommand;
use crate::error::ShellError;
use crate::host::format_size;
use crate::session::Session;
use anyhow::{Context, Result, bail};
use argh::FromArgs;
use regex::{Regex, RegexBuilder};
use std::fs;
use std::io::{BufRead, BufReader, Read, Write};
use walkdir::WalkDir;

#[derive(FromArgs)]
/// Estimate disk usage of a directory tree.
pub struct Du {
    #[argh(positional)]
    /// directory to measure; defaults to the current directory.
    pub path: Option<String>,
}

impl BuiltinCommand for Du {
    fn name() -> &'static str {
        "du"
    }

    fn execute(self, stdout: &mut dyn Write, session: &mut Session) -> Result<()> {
        let root = match &self.path {
            Some(p) => session.resolve(p),
            None => session.working_dir().to_path_buf(),
        };
        if !root.exists() {
            bail!(ShellError::NotFound(format!(
                "du: cannot access '{}': No such file or directory",
                self.path.as_deref().unwrap_or(".")
            )));
        }
        let total: u64 = WalkDir::new(&root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| e.metadata().ok())
            .map(|m| m.len())
            .sum();
        writeln!(stdout, "{}", format_size(total))?;
        Ok(())
    }
}

#[derive(FromArgs)]
/// Search for files whose name contains a pattern.
/// Usage: find [path] -name [pattern]
pub struct Find {
    #[argh(positional, greedy)]
    /// starting path followed by `-name <pattern>`.
    pub args: Vec<String>,
}

impl BuiltinCommand for Find {
    fn name() -> &'static str {
        "find"
    }

    fn execute(self, stdout: &mut dyn Write, session: &mut Session) -> Result<()> {
        let usage = || ShellError::InvalidArgument("Usage: find [path] -name [pattern]".into());
        let (path, pattern) = match self.args.as_slice() {
            [path, flag, pattern] if flag == "-name" => (path, pattern.as_str()),
            [path, flag] if flag == "-name" => (path, ""),
            _ => bail!(usage()),
        };

        let root = session.resolve(path);
        let results: Vec<String> = WalkDir::new(&root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| e.file_name().to_string_lossy().contains(pattern))
            .map(|e| e.path().display().to_string())
            .collect();

        if results.is_empty() {
            writeln!(stdout, "No files found")?;
        } else {
            writeln!(stdout, "{}", results.join("\n"))?;
        }
        Ok(())
    }
}

#[derive(argh::FromArgs)]
/// print numbered lines matching a pattern
pub struct Grep {
    #[argh(positional)]
    /// the pattern to search for (a regular expression), then the files to search.
    pub operands: Vec<String>,

    #[argh(switch, short = 'w')]
    /// match only whole words (using non-word characters as boundaries)
    pub word_regexp: bool,

    #[argh(switch, short = 'i')]
    /// ignore case distinctions
    pub ignore_case: bool,

    #[argh(option, short = 'A', default = "0")]
    /// print NUM lines of trailing context after matching lines
    pub after_context: usize,
}

impl Grep {
    /// Write `N: line` for every printed line; returns whether anything matched.
    fn process_source(
        &self,
        reader: &mut dyn Read,
        stdout: &mut dyn Write,
        file_name: Option<&str>,
        re: &Regex,
    ) -> Result<bool> {
        let reader = BufReader::new(reader);
        let lines: Vec<String> = reader
            .lines()
            .collect::<std::io::Result<_>>()
            .context("read error")?;

        let mut to_print = vec![false; lines.len()];
        let mut matched = false;
        for (i, line) in lines.iter().enumerate() {
            if re.is_match(line) {
                matched = true;
                let end = (i + self.after_context + 1).min(lines.len());
                to_print[i..end].iter_mut().for_each(|p| *p = true);
            }
        }

        let prefix = file_name.map(|name| format!("{name}:")).unwrap_or_default();
        let mut last_printed: Option<usize> = None;
        for (i, line) in lines.iter().enumerate() {
            if !to_print[i] {
                continue;
            }
            if self.after_context > 0 && last_printed.is_some_and(|last| i > last + 1) {
                writeln!(stdout, "--")?;
            }
            writeln!(stdout, "{}{}: {}", prefix, i + 1, line.trim())?;
            last_printed = Some(i);
        }
        Ok(matched)
    }
}

impl BuiltinCommand for Grep {
    fn name() -> &'static str {
        "grep"
    }

    fn execute(self, stdout: &mut dyn Write, session: &mut Session) -> Result<()> {
        let [user_pattern, files @ ..] = self.operands.as_slice() else {
            bail!(ShellError::InvalidArgument("Usage: grep [pattern] [file]".into()));
        };
        if files.is_empty() {
            bail!(ShellError::InvalidArgument("Usage: grep [pattern] [file]".into()));
        }

        let pattern = if self.word_regexp {
            format!(r"\b({user_pattern})\b")
        } else {
            user_pattern.clone()
        };
        let re = RegexBuilder::new(&pattern)
            .case_insensitive(self.ignore_case)
            .build()
            .with_context(|| format!("grep: invalid regex pattern: {pattern}"))?;

        let show_names = files.len() > 1;
        let mut any_match = false;
        for file_name in files {
            let mut file = fs::File::open(session.resolve(file_name)).map_err(|_| {
                ShellError::NotFound(format!("grep: {file_name}: No such file or directory"))
            })?;
            let label = show_names.then_some(file_name.as_str());
            any_match |= self.process_source(&mut file, stdout, label, &re)?;
        }
        if !any_match {
            writeln!(stdout, "No matches found for '{user_pattern}'")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::test_support::{run, session_in};

    #[test]
    fn test_grep_numbers_matching_lines() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("f.txt"), "alpha\n  beta target  \ngamma target\n").unwrap();
        let mut session = session_in(tmp.path());

        let out = run::<Grep>(&mut session, &["target", "f.txt"]).unwrap();
        assert_eq!(out, "2: beta target\n3: gamma target\n");
    }

    #[test]
    fn test_grep_ignore_case_flag_after_operands() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("f.txt"), "Target 1\nTaRgEt 2\nNo match\n").unwrap();
        let mut session = session_in(tmp.path());

        let out = run::<Grep>(&mut session, &["target", "f.txt", "-i"]).unwrap();
        assert_eq!(out, "1: Target 1\n2: TaRgEt 2\n");
    }

    #[test]
    fn test_grep_trailing_context() {
        let tmp = tempfile::tempdir().unwrap();
        let content = "Line 1\nMATCH 1\nLine 3\nLine 4\nMATCH 2\nLine 6\nLine 7\n";
        fs::write(tmp.path().join("f.txt"), content).unwrap();
        let mut session = session_in(tmp.path());

        let out = run::<Grep>(&mut session, &["-A", "1", "MATCH", "f.txt"]).unwrap();
        assert_eq!(out, "2: MATCH 1\n3: Line 3\n--\n5: MATCH 2\n6: Line 6\n");
    }

    #[test]
    fn test_grep_no_match_and_usage() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("f.txt"), "nothing here\n").unwrap();
        let mut session = session_in(tmp.path());

        assert_eq!(
            run::<Grep>(&mut session, &["zzz", "f.txt"]).unwrap(),
            "No matches found for 'zzz'\n"
        );
        assert_eq!(
            run::<Grep>(&mut session, &["zzz"]).unwrap_err().to_string(),
            "Usage: grep [pattern] [file]"
        );
        assert_eq!(
            run::<Grep>(&mut session, &["zzz", "missing"]).unwrap_err().to_string(),
            "grep: missing: No such file or directory"
        );
    }

    #[test]
    fn test_find_by_name_fragment() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("a/b")).unwrap();
        fs::write(tmp.path().join("a/notes.txt"), "").unwrap();
        fs::write(tmp.path().join("a/b/more_notes.md"), "").unwrap();
        fs::write(tmp.path().join("a/other.rs"), "").unwrap();
        let mut session = session_in(tmp.path());

        let out = run::<Find>(&mut session, &["a", "-name", "notes"]).unwrap();
        let mut found: Vec<&str> = out.lines().collect();
        found.sort();
        assert_eq!(found.len(), 2);
        assert!(found.iter().any(|p| p.ends_with("a/notes.txt")));
        assert!(found.iter().any(|p| p.ends_with("a/b/more_notes.md")));

        assert_eq!(
            run::<Find>(&mut session, &["a", "-name", "zzz"]).unwrap(),
            "No files found\n"
        );
        assert_eq!(
            run::<Find>(&mut session, &["a"]).unwrap_err().to_string(),
            "Usage: find [path] -name [pattern]"
        );
    }

    #[test]
    fn test_du_sums_file_sizes() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir(tmp.path().join("d")).unwrap();
        fs::write(tmp.path().join("d/a"), vec![0u8; 1024]).unwrap();
        fs::write(tmp.path().join("d/b"), vec![0u8; 512]).unwrap();
        let mut session = session_in(tmp.path());

        assert_eq!(run::<Du>(&mut session, &["d"]).unwrap(), "1.5K\n");
        assert!(run::<Du>(&mut session, &["nope"]).is_err());
    }
}
