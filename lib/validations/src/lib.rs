//! # Input Validation Module
//!
//! This module provides validation functions for user inputs to prevent
//! invalid data from entering the system and improve security.

use std::sync::OnceLock;

use anyhow::{Context, anyhow};
use regex::Regex;

/// Options to validate input strings to have certain properties.
/// This ensures only valid data can enter the system.
///
/// ## Usage
///
/// ```
/// StringValidator::default()
///   .min_length(1)
///   .max_length(100)
///   .matches(StringValidatorMatches::ColumnIdentifier)
///   .validate("captured_title")?
/// ```
#[derive(Default)]
pub struct StringValidator {
  /// Specify the minimum length of string.
  /// Setting `0` will effectively skip this validation.
  pub min_length: usize,
  /// Specify max length of string, or None to allow arbitrary length.
  pub max_length: Option<usize>,
  /// Skip the control character check.
  /// Most values should not contain these by default.
  pub skip_control_check: bool,
  /// Specify a pattern to validate the string contents.
  pub matches: Option<StringValidatorMatches>,
}

impl StringValidator {
  /// Returns Ok if input passes validations, otherwise includes
  /// error with failure reason.
  pub fn validate(&self, input: &str) -> anyhow::Result<()> {
    let len = input.chars().count();

    if len < self.min_length {
      return Err(anyhow!(
        "Input too short. Must be at least {} characters.",
        self.min_length
      ));
    }

    if let Some(max_length) = self.max_length
      && len > max_length
    {
      return Err(anyhow!(
        "Input too long. Must be at most {max_length} characters."
      ));
    }

    if !self.skip_control_check {
      validate_no_control_chars(input)?;
    }

    if let Some(matches) = &self.matches {
      matches.validate(input)?
    }

    Ok(())
  }

  pub fn min_length(mut self, min_length: usize) -> StringValidator {
    self.min_length = min_length;
    self
  }

  pub fn max_length(
    mut self,
    max_length: impl Into<Option<usize>>,
  ) -> StringValidator {
    self.max_length = max_length.into();
    self
  }

  pub fn skip_control_check(mut self) -> StringValidator {
    self.skip_control_check = true;
    self
  }

  pub fn matches(
    mut self,
    matches: impl Into<Option<StringValidatorMatches>>,
  ) -> StringValidator {
    self.matches = matches.into();
    self
  }
}

pub enum StringValidatorMatches {
  /// - begins with a non-digit, non-symbol character (letters of any
  ///   script, including CJK, or an underscore)
  /// - continues with word characters (letters, digits, underscore,
  ///   any script)
  ///
  /// Used for user-declared task/result table column names; the
  /// reserved system column names are rejected separately by the
  /// caller, since that set is schema-specific, not a string shape.
  ColumnIdentifier,
  /// - http or https URL.
  HttpUrl,
}

impl StringValidatorMatches {
  /// Returns Ok if input passes validations, otherwise includes
  /// error with failure reason.
  fn validate(&self, input: &str) -> anyhow::Result<()> {
    let validate = || match self {
      StringValidatorMatches::ColumnIdentifier => {
        static COLUMN_IDENTIFIER_REGEX: OnceLock<Regex> =
          OnceLock::new();
        let regex = COLUMN_IDENTIFIER_REGEX.get_or_init(|| {
          Regex::new(r"^[\p{L}_][\w]*$")
            .expect("Failed to initialize column identifier regex")
        });
        if regex.is_match(input) {
          Ok(())
        } else {
          Err(anyhow!(
            "Must start with a letter or underscore and contain only letters, digits, or underscores"
          ))
        }
      }

      StringValidatorMatches::HttpUrl => {
        if !input.starts_with("http://")
          && !input.starts_with("https://")
        {
          return Err(anyhow!(
            "Input must start with http:// or https://"
          ));
        }
        url::Url::parse(input)
          .context("Failed to parse input as URL")
          .map(|_| ())
      }
    };
    validate().context("Invalid characters in input")
  }
}

fn validate_no_control_chars(input: &str) -> anyhow::Result<()> {
  for (index, char) in input.chars().enumerate() {
    if char.is_control() {
      return Err(anyhow!(
        "Control character at index {index}. Input: \"{input}\""
      ));
    }
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn column_name_validator() -> StringValidator {
    StringValidator::default()
      .min_length(1)
      .max_length(63)
      .matches(StringValidatorMatches::ColumnIdentifier)
  }

  #[test]
  fn accepts_plain_identifier() {
    assert!(column_name_validator().validate("url").is_ok());
    assert!(column_name_validator().validate("_hidden").is_ok());
    assert!(column_name_validator().validate("title_2").is_ok());
  }

  #[test]
  fn accepts_cjk_identifier() {
    assert!(column_name_validator().validate("标题").is_ok());
  }

  #[test]
  fn rejects_leading_digit() {
    assert!(column_name_validator().validate("2fast").is_err());
  }

  #[test]
  fn rejects_symbol() {
    assert!(column_name_validator().validate("title;drop").is_err());
    assert!(column_name_validator().validate("a-b").is_err());
  }

  #[test]
  fn rejects_empty() {
    assert!(column_name_validator().validate("").is_err());
  }
}
