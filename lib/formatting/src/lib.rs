use colored::Colorize;

pub enum Color {
  Red,
  Green,
  Blue,
}

pub fn colored(content: impl std::fmt::Display, color: Color) -> String {
  let content = content.to_string();
  match color {
    Color::Red => content.red().to_string(),
    Color::Green => content.green().to_string(),
    Color::Blue => content.blue().to_string(),
  }
}

pub fn bold(content: impl std::fmt::Display) -> String {
  content.to_string().bold().to_string()
}

pub fn muted(content: impl std::fmt::Display) -> String {
  content.to_string().dimmed().to_string()
}

/// Green `SUCCESS` tag, prefixed to INFO lines which
/// report a finished step.
pub fn success() -> String {
  "SUCCESS".green().bold().to_string()
}

/// Red `FAILED` tag.
pub fn failed() -> String {
  "FAILED".red().bold().to_string()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn plain_text_survives_without_tty() {
    colored::control::set_override(false);
    assert_eq!(colored("relay", Color::Blue), "relay");
    assert_eq!(bold("rembg"), "rembg");
    assert_eq!(success(), "SUCCESS");
    colored::control::unset_override();
  }
}
