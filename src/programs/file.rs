//! # Program file loader.
//!
//! Reads the YAML program file and applies the defaulting rules:
//!
//! ```yaml
//! programs:
//!   web:
//!     cmd: /usr/bin/python3      # required
//!     args: ["-m", "http.server"]
//!     numprocs: 2                # default 1, must be >= 1
//!     umask: 022                 # octal: 022, "022" or 0o22
//!     autostart: true            # default false
//!     autorestart: unexpected    # always | never | unexpected (default)
//!     exitcodes: [0, 2]          # default [0], kept sorted
//!     startretries: 3
//!     starttime: 5               # seconds
//!     stopsignal: TERM
//!     stoptime: 10               # seconds
//!     env: { PORT: 8080 }
//! ```
//!
//! Programs keep file order. Any error rejects the whole file.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use serde_yaml::Value;

use crate::error::ConfigError;
use crate::policies::AutoRestart;
use crate::programs::set::ProgramSet;
use crate::programs::signal::StopSignal;
use crate::programs::spec::{DEFAULT_START_RETRIES, DEFAULT_START_TIME, DEFAULT_STOP_TIME, ProcessSpec};

#[derive(Deserialize)]
struct ProgramFile {
    programs: Option<serde_yaml::Mapping>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawProgram {
    cmd: Option<String>,
    #[serde(default)]
    args: Vec<String>,
    numprocs: Option<i64>,
    umask: Option<Value>,
    workingdir: Option<PathBuf>,
    #[serde(default)]
    autostart: bool,
    autorestart: Option<String>,
    #[serde(default)]
    exitcodes: Vec<i32>,
    startretries: Option<u32>,
    starttime: Option<u64>,
    stopsignal: Option<String>,
    stoptime: Option<u64>,
    stdin: Option<PathBuf>,
    stdout: Option<PathBuf>,
    stderr: Option<PathBuf>,
    #[serde(default)]
    env: BTreeMap<String, Value>,
}

/// Reads and parses a program file.
pub fn load(path: impl AsRef<Path>) -> Result<ProgramSet, ConfigError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_document(&text, &path.display().to_string())
}

/// Parses an in-memory program document.
pub fn parse(text: &str) -> Result<ProgramSet, ConfigError> {
    parse_document(text, "<inline>")
}

fn parse_document(text: &str, origin: &str) -> Result<ProgramSet, ConfigError> {
    let text = quote_octal_umask(text);
    let file: ProgramFile = serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
        origin: origin.to_string(),
        source,
    })?;
    let programs = file.programs.ok_or_else(|| ConfigError::MissingPrograms {
        origin: origin.to_string(),
    })?;

    let mut set = ProgramSet::new();
    for (key, value) in programs {
        let name = match key {
            Value::String(s) => s,
            other => scalar_to_string(&other)
                .ok_or_else(|| ConfigError::invalid("?", "name", "program names must be scalars"))?,
        };
        let raw: RawProgram = serde_yaml::from_value(value).map_err(|source| ConfigError::Parse {
            origin: format!("{origin}: program `{name}`"),
            source,
        })?;
        set.insert(build_spec(&name, raw)?);
    }
    Ok(set)
}

fn build_spec(name: &str, raw: RawProgram) -> Result<ProcessSpec, ConfigError> {
    let cmd = raw
        .cmd
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| ConfigError::invalid(name, "cmd", "is required"))?;

    let numprocs = match raw.numprocs {
        None => 1,
        Some(n) if n >= 1 => n as usize,
        Some(n) => return Err(ConfigError::invalid(name, "numprocs", format!("must be at least 1, got {n}"))),
    };

    let autorestart = match raw.autorestart.as_deref() {
        None => AutoRestart::default(),
        Some(s) => s
            .parse::<AutoRestart>()
            .map_err(|reason| ConfigError::invalid(name, "autorestart", reason))?,
    };

    let stopsignal = match raw.stopsignal.as_deref() {
        None => StopSignal::default(),
        Some(s) => s
            .parse::<StopSignal>()
            .map_err(|reason| ConfigError::invalid(name, "stopsignal", reason))?,
    };

    let umask = raw
        .umask
        .as_ref()
        .map(|v| parse_umask(v).map_err(|reason| ConfigError::invalid(name, "umask", reason)))
        .transpose()?;

    let mut builder = ProcessSpec::builder(name, cmd)
        .args(raw.args)
        .numprocs(numprocs)
        .umask(umask)
        .autostart(raw.autostart)
        .autorestart(autorestart)
        .exitcodes(raw.exitcodes)
        .startretries(raw.startretries.unwrap_or(DEFAULT_START_RETRIES))
        .starttime(raw.starttime.map_or(DEFAULT_START_TIME, Duration::from_secs))
        .stopsignal(stopsignal)
        .stoptime(raw.stoptime.map_or(DEFAULT_STOP_TIME, Duration::from_secs));

    if let Some(dir) = raw.workingdir {
        builder = builder.workingdir(dir);
    }
    if let Some(p) = raw.stdin {
        builder = builder.stdin(p);
    }
    if let Some(p) = raw.stdout {
        builder = builder.stdout(p);
    }
    if let Some(p) = raw.stderr {
        builder = builder.stderr(p);
    }
    for (key, value) in raw.env {
        let value = scalar_to_string(&value)
            .ok_or_else(|| ConfigError::invalid(name, "env", format!("`{key}` must be a scalar")))?;
        builder = builder.env(key, value);
    }
    Ok(builder.build())
}

/// Reads a umask written in octal digits: `022`, `"022"`, `"0o22"` → `0o22`.
///
/// YAML integers lose their leading zero, so their decimal digits are reread as octal.
fn parse_umask(value: &Value) -> Result<u32, String> {
    let digits = match value {
        Value::Number(n) => n
            .as_u64()
            .map(|n| n.to_string())
            .ok_or_else(|| format!("`{n}` is not a non-negative integer"))?,
        Value::String(s) => {
            let s = s.trim();
            s.strip_prefix("0o").unwrap_or(s).to_string()
        }
        _ => return Err("expected octal digits".to_string()),
    };
    let mask = u32::from_str_radix(&digits, 8).map_err(|_| format!("`{digits}` is not octal"))?;
    if mask > 0o777 {
        return Err(format!("{mask:o} exceeds 777"));
    }
    Ok(mask)
}

/// Quotes unquoted `umask: 0o..` values so [`parse_umask`] sees them as written.
///
/// YAML reads `0o20` as the integer 16, whose digits would then be reread as
/// octal `16`.
fn quote_octal_umask(text: &str) -> Cow<'_, str> {
    const KEY: &str = "umask:";
    let mut out = String::new();
    let mut copied = 0;
    let mut from = 0;
    while let Some(found) = text[from..].find(KEY) {
        let at = from + found;
        from = at + KEY.len();
        let lead = text[..at].trim_end_matches([' ', '\t']);
        if !(lead.is_empty() || lead.ends_with(['\n', '{', ','])) {
            continue;
        }
        let value = text[from..].trim_start_matches([' ', '\t']);
        if !value.starts_with("0o") {
            continue;
        }
        let start = text.len() - value.len();
        let end = start
            + value
                .find(|c: char| !c.is_ascii_alphanumeric())
                .unwrap_or(value.len());
        out.push_str(&text[copied..start]);
        out.push('"');
        out.push_str(&text[start..end]);
        out.push('"');
        copied = end;
        from = end;
    }
    if copied == 0 {
        return Cow::Borrowed(text);
    }
    out.push_str(&text[copied..]);
    Cow::Owned(out)
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
programs:
  web:
    cmd: /usr/bin/python3
    args: ["-m", "http.server"]
    numprocs: 2
    umask: 022
    workingdir: /tmp
    autostart: true
    autorestart: never
    exitcodes: [2, 0]
    startretries: 5
    starttime: 3
    stopsignal: usr1
    stoptime: 7
    stdout: /tmp/web.out
    env:
      PORT: 8080
      MODE: prod
  worker:
    cmd: /bin/sleep
    args: ["60"]
"#;

    #[test]
    fn parses_full_program() {
        let set = parse(SAMPLE).unwrap();
        assert_eq!(set.names(), vec!["web", "worker"]);

        let web = set.get("web").unwrap();
        assert_eq!(web.cmd(), "/usr/bin/python3");
        assert_eq!(web.numprocs(), 2);
        assert_eq!(web.umask(), Some(0o22));
        assert!(web.autostart());
        assert_eq!(web.autorestart(), AutoRestart::Never);
        assert_eq!(web.exitcodes(), &[0, 2]);
        assert_eq!(web.startretries(), 5);
        assert_eq!(web.starttime(), Duration::from_secs(3));
        assert_eq!(web.stopsignal().name(), "USR1");
        assert_eq!(web.stoptime(), Duration::from_secs(7));
        assert_eq!(web.stdout(), Some(Path::new("/tmp/web.out")));
        assert_eq!(web.env().get("PORT").map(String::as_str), Some("8080"));
    }

    #[test]
    fn applies_defaults() {
        let set = parse(SAMPLE).unwrap();
        let worker = set.get("worker").unwrap();
        assert_eq!(worker.numprocs(), 1);
        assert!(!worker.autostart());
        assert_eq!(worker.autorestart(), AutoRestart::Unexpected);
        assert_eq!(worker.exitcodes(), &[0]);
        assert_eq!(worker.stopsignal().name(), "TERM");
        assert_eq!(worker.umask(), None);
    }

    #[test]
    fn empty_restart_policy_means_unexpected() {
        let set = parse("programs:\n  a:\n    cmd: /bin/true\n    autorestart: \"\"\n").unwrap();
        assert_eq!(set.get("a").unwrap().autorestart(), AutoRestart::Unexpected);
    }

    #[test]
    fn rejects_invalid_programs() {
        let cases = [
            ("programs:\n  a:\n    args: [x]\n", "cmd"),
            ("programs:\n  a:\n    cmd: /bin/true\n    numprocs: 0\n", "numprocs"),
            ("programs:\n  a:\n    cmd: /bin/true\n    autorestart: maybe\n", "autorestart"),
            ("programs:\n  a:\n    cmd: /bin/true\n    stopsignal: BOGUS\n", "stopsignal"),
            ("programs:\n  a:\n    cmd: /bin/true\n    umask: 99\n", "umask"),
        ];
        for (doc, field) in cases {
            match parse(doc) {
                Err(ConfigError::Invalid { field: f, .. }) => assert_eq!(f, field, "{doc}"),
                other => panic!("expected invalid `{field}`, got {other:?}"),
            }
        }
    }

    #[test]
    fn rejects_unknown_keys_and_missing_section() {
        assert!(matches!(
            parse("programs:\n  a:\n    cmd: /bin/true\n    autorestar: never\n"),
            Err(ConfigError::Parse { .. })
        ));
        assert!(matches!(
            parse("other: 1\n"),
            Err(ConfigError::MissingPrograms { .. })
        ));
        assert!(matches!(parse("programs: [\n"), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn umask_accepts_strings() {
        assert_eq!(parse_umask(&Value::String("0o027".into())), Ok(0o27));
        assert_eq!(parse_umask(&Value::String("077".into())), Ok(0o77));
    }

    #[test]
    fn umask_accepts_unquoted_octal_prefix() {
        let doc = "programs:\n  a:\n    cmd: /bin/true\n    umask: 0o20   # group write\n  b: { cmd: /bin/true, umask: 0o77 }\n";
        let set = parse(doc).unwrap();
        assert_eq!(set.get("a").unwrap().umask(), Some(0o20));
        assert_eq!(set.get("b").unwrap().umask(), Some(0o77));

        let untouched = "programs:\n  a:\n    cmd: /bin/echo\n    args: [\"umask: 0o7\"]\n";
        assert!(matches!(quote_octal_umask(untouched), Cow::Borrowed(_)));
        assert_eq!(parse(untouched).unwrap().get("a").unwrap().args(), ["umask: 0o7"]);
    }

    #[test]
    fn loads_from_disk_and_reports_missing_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        assert_eq!(load(file.path()).unwrap().len(), 2);

        let err = load("/definitely/not/here.yaml").unwrap_err();
        assert_eq!(err.as_label(), "config_read");
    }
}
