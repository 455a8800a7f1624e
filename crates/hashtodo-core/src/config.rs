use std::collections::BTreeMap;
use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow,
  bail
};
use chrono::Duration;
use tracing::{
  debug,
  info,
  warn
};

use crate::datastore::DEFAULT_STORAGE_KEY;
use crate::notifier::DEFAULT_NOTICE_SECONDS;

/// Settings keyed by dotted name:
/// built-in defaults, then the
/// todorc file, then command-line
/// overrides.
#[derive(Debug, Clone)]
pub struct Config {
  values: BTreeMap<String, String>,
  source: Option<PathBuf>
}

impl Default for Config {
  fn default() -> Self {
    let values = [
      ("data.location", "~/.hashtodo".to_string()),
      ("storage.key", DEFAULT_STORAGE_KEY.to_string()),
      ("notify.seconds", DEFAULT_NOTICE_SECONDS.to_string()),
      ("color", "on".to_string()),
      ("default.command", "list".to_string())
    ]
    .into_iter()
    .map(|(key, value)| {
      (key.to_string(), value)
    })
    .collect();

    Self {
      values,
      source: None
    }
  }
}

impl Config {
  #[tracing::instrument]
  pub fn load(
    rc_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Self::default();
    let Some(path) =
      locate_todorc(rc_override)
    else {
      debug!("no todorc, defaults only");
      return Ok(cfg);
    };

    info!(todorc = %path.display(), "reading todorc");
    let text = fs::read_to_string(&path)
      .with_context(|| {
        format!(
          "failed to read {}",
          path.display()
        )
      })?;
    cfg
      .merge_rc(&text)
      .with_context(|| {
        format!("in {}", path.display())
      })?;
    cfg.source = Some(path);
    Ok(cfg)
  }

  /// `key = value` per line. A `#` at
  /// the start of a line or after
  /// whitespace opens a comment.
  fn merge_rc(
    &mut self,
    text: &str
  ) -> anyhow::Result<()> {
    for (idx, raw) in
      text.lines().enumerate()
    {
      let line =
        strip_comment(raw).trim();
      if line.is_empty() {
        continue;
      }

      match line.split_once('=') {
        | Some((key, value))
          if !key.trim().is_empty() =>
        {
          self.set(
            key.trim(),
            value.trim()
          );
        }
        | _ => bail!(
          "line {}: expected \
           `key = value`, got {raw:?}",
          idx + 1
        )
      }
    }
    Ok(())
  }

  /// Command-line pairs; the `rc.`
  /// prefix is optional.
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (raw, value) in overrides {
      let key = raw
        .strip_prefix("rc.")
        .unwrap_or(&raw);
      debug!(key, value = %value, "command-line override");
      self.set(key, &value);
    }
  }

  fn set(
    &mut self,
    key: &str,
    value: &str
  ) {
    if !self.values.contains_key(key) {
      warn!(key, "unknown setting");
    }
    self
      .values
      .insert(key.to_string(), value.to_string());
  }

  pub fn get(
    &self,
    key: &str
  ) -> Option<&str> {
    self
      .values
      .get(key)
      .map(String::as_str)
  }

  /// On/off switch. Unrecognised
  /// values are errors rather than
  /// silently off.
  pub fn get_bool(
    &self,
    key: &str
  ) -> anyhow::Result<Option<bool>> {
    let Some(raw) = self.get(key) else {
      return Ok(None);
    };
    match raw
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "on" | "yes" | "y" | "true"
      | "1" => Ok(Some(true)),
      | "off" | "no" | "n" | "false"
      | "0" => Ok(Some(false)),
      | _ => Err(anyhow!(
        "invalid {key} setting: {raw}"
      ))
    }
  }

  /// Sorted by key.
  pub fn iter(
    &self
  ) -> impl Iterator<Item = (&str, &str)>
  {
    self.values.iter().map(|(k, v)| {
      (k.as_str(), v.as_str())
    })
  }

  /// The todorc file the values came
  /// from, if any.
  pub fn source(&self) -> Option<&Path> {
    self.source.as_deref()
  }

  pub fn storage_key(&self) -> String {
    self
      .get("storage.key")
      .map(str::trim)
      .filter(|key| !key.is_empty())
      .unwrap_or(DEFAULT_STORAGE_KEY)
      .to_string()
  }

  /// How long the transient notice
  /// stays up.
  pub fn notice_duration(
    &self
  ) -> anyhow::Result<Duration> {
    let Some(raw) =
      self.get("notify.seconds")
    else {
      return Ok(Duration::seconds(
        DEFAULT_NOTICE_SECONDS
      ));
    };

    let seconds = raw
      .trim()
      .parse::<i64>()
      .with_context(|| {
        format!(
          "invalid notify.seconds: \
           {raw}"
        )
      })?;
    if seconds <= 0 {
      bail!(
        "notify.seconds must be \
         positive, got {seconds}"
      );
    }
    Ok(Duration::seconds(seconds))
  }

  /// `--data` wins over
  /// `data.location`. Missing
  /// directories are created.
  pub fn data_dir(
    &self,
    override_dir: Option<&Path>
  ) -> anyhow::Result<PathBuf> {
    let dir = match override_dir {
      | Some(dir) => dir.to_path_buf(),
      | None => home_relative(
        self
          .get("data.location")
          .unwrap_or("~/.hashtodo")
      )?
    };

    fs::create_dir_all(&dir)
      .with_context(|| {
        format!(
          "failed to create {}",
          dir.display()
        )
      })?;
    debug!(dir = %dir.display(), "data directory ready");
    Ok(dir)
  }
}

/// `--todorc`, else `$TODORC`
/// (`/dev/null` turns the file off),
/// else `~/.todorc` when it exists.
fn locate_todorc(
  explicit: Option<&Path>
) -> Option<PathBuf> {
  if let Some(path) = explicit {
    return Some(path.to_path_buf());
  }

  match std::env::var_os("TODORC") {
    | Some(value)
      if value == "/dev/null" =>
    {
      None
    }
    | Some(value) => {
      Some(PathBuf::from(value))
    }
    | None => dirs::home_dir()
      .map(|home| home.join(".todorc"))
      .filter(|path| path.is_file())
  }
}

fn home_relative(
  value: &str
) -> anyhow::Result<PathBuf> {
  let Some(rest) =
    value.strip_prefix("~/")
  else {
    return Ok(PathBuf::from(value));
  };
  dirs::home_dir()
    .map(|home| home.join(rest))
    .ok_or_else(|| {
      anyhow!(
        "cannot determine home \
         directory for {value}"
      )
    })
}

fn strip_comment(line: &str) -> &str {
  let mut after_blank = true;
  for (idx, ch) in line.char_indices() {
    if ch == '#' && after_blank {
      return &line[..idx];
    }
    after_blank = ch.is_whitespace();
  }
  line
}
