//! Side-effect-free security study tools: SHA-256 digests and password strength analysis.

use serde::Serialize;
use sha2::{Digest, Sha256};

const SPECIAL_CHARS: &str = "!@#$%^&*()_+-=[]{}|;:,.<>?";

/// Character classes counted toward the brute-force search space.
const CHAR_CLASSES: [(&str, usize); 5] = [
  ("lowercase letters", 26),
  ("uppercase letters", 26),
  ("digits", 10),
  ("special characters", SPECIAL_CHARS.len()),
  ("spaces", 1),
];

/// Attacker profiles and their guesses per second.
const SCENARIOS: [(&str, f64); 4] = [
  ("Amateur Hacker", 1e3),
  ("Professional Hacker", 1e6),
  ("Hacker Group", 1e9),
  ("Government Agency", 1e12),
];

const SECS_PER_YEAR: f64 = 31_536_000.0;

pub fn sha256_hex(text: &str) -> String {
  format!("{:x}", Sha256::digest(text.as_bytes()))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strength {
  VeryWeak,
  Weak,
  Good,
  Strong,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CrackEstimate {
  pub scenario: &'static str,
  pub guesses_per_second: f64,
  pub time: String,
}

/// Strength report. Never carries the password itself.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PasswordReport {
  pub length: usize,
  pub entropy_bits: f64,
  pub score: u8,
  pub strength: Strength,
  pub char_classes: Vec<&'static str>,
  pub crack_times: Vec<CrackEstimate>,
  pub weaknesses: Vec<&'static str>,
}

fn class_of(c: char) -> Option<usize> {
  match c {
    'a'..='z' => Some(0),
    'A'..='Z' => Some(1),
    '0'..='9' => Some(2),
    ' ' => Some(4),
    _ if SPECIAL_CHARS.contains(c) => Some(3),
    _ => None,
  }
}

/// Bits of entropy assuming a uniform pick from every class the password touches.
fn entropy(password: &str) -> (f64, Vec<&'static str>) {
  let mut used = [false; CHAR_CLASSES.len()];
  for c in password.chars() {
    if let Some(i) = class_of(c) {
      used[i] = true;
    }
  }
  let space: usize = CHAR_CLASSES.iter().zip(used).filter(|(_, u)| *u).map(|((_, n), _)| n).sum();
  let names = CHAR_CLASSES.iter().zip(used).filter(|(_, u)| *u).map(|((name, _), _)| *name).collect();
  if space == 0 {
    return (0.0, names);
  }
  (password.chars().count() as f64 * (space as f64).log2(), names)
}

fn format_duration(seconds: f64) -> String {
  if seconds.is_infinite() {
    "Longer than the age of the universe".to_string()
  } else if seconds < 1.0 {
    "Less than 1 second".to_string()
  } else if seconds < 60.0 {
    format!("{:.1} seconds", seconds)
  } else if seconds < 3_600.0 {
    format!("{:.1} minutes", seconds / 60.0)
  } else if seconds < 86_400.0 {
    format!("{:.1} hours", seconds / 3_600.0)
  } else if seconds < SECS_PER_YEAR {
    format!("{:.1} days", seconds / 86_400.0)
  } else if seconds < SECS_PER_YEAR * 1_000.0 {
    format!("{:.1} years", seconds / SECS_PER_YEAR)
  } else {
    format!("{:.0e} years", seconds / SECS_PER_YEAR)
  }
}

/// Average time to crack (half the space) for each scenario, computed in log space.
fn crack_times(entropy_bits: f64) -> Vec<CrackEstimate> {
  if entropy_bits <= 0.0 {
    return Vec::new();
  }
  SCENARIOS
    .iter()
    .map(|&(scenario, speed)| {
      let ln_seconds = entropy_bits * std::f64::consts::LN_2 - std::f64::consts::LN_2 - speed.ln();
      let seconds = if ln_seconds > 50.0 { f64::INFINITY } else { ln_seconds.exp() };
      CrackEstimate { scenario, guesses_per_second: speed, time: format_duration(seconds) }
    })
    .collect()
}

fn grade(entropy_bits: f64) -> (u8, Strength) {
  let e = entropy_bits;
  if e <= 0.0 {
    (0, Strength::VeryWeak)
  } else if e <= 30.0 {
    ((e / 30.0 * 25.0) as u8, Strength::VeryWeak)
  } else if e <= 50.0 {
    ((25.0 + (e - 30.0) / 20.0 * 25.0) as u8, Strength::Weak)
  } else if e <= 70.0 {
    ((50.0 + (e - 50.0) / 20.0 * 25.0) as u8, Strength::Good)
  } else {
    ((75.0 + (e - 70.0) / 20.0 * 25.0).min(100.0) as u8, Strength::Strong)
  }
}

fn weaknesses(password: &str) -> Vec<&'static str> {
  let chars: Vec<char> = password.chars().collect();
  let mut found = Vec::new();
  if chars.len() < 8 {
    found.push("Too short (less than 8 characters)");
  }
  if !chars.iter().any(|c| c.is_ascii_lowercase()) {
    found.push("No lowercase letters");
  }
  if !chars.iter().any(|c| c.is_ascii_uppercase()) {
    found.push("No uppercase letters");
  }
  if !chars.iter().any(|c| c.is_ascii_digit()) {
    found.push("No numbers");
  }
  if !chars.iter().any(|c| SPECIAL_CHARS.contains(*c)) {
    found.push("No special characters");
  }
  if chars.windows(3).any(|w| w[0] == w[1] && w[1] == w[2]) {
    found.push("Contains repeated characters");
  }
  let ascending = |w: &[char]| {
    let d: Vec<u32> = w.iter().filter_map(|c| c.to_digit(10)).collect();
    d.len() == 3 && d[1] == (d[0] + 1) % 10 && d[2] == (d[1] + 1) % 10 && d[0] != 9
  };
  if chars.windows(3).any(ascending) {
    found.push("Contains number sequence");
  }
  found
}

pub fn analyze_password(password: &str) -> PasswordReport {
  let (bits, char_classes) = entropy(password);
  let (score, strength) = grade(bits);
  PasswordReport {
    length: password.chars().count(),
    entropy_bits: (bits * 10.0).round() / 10.0,
    score,
    strength,
    char_classes,
    crack_times: crack_times(bits),
    weaknesses: weaknesses(password),
  }
}
