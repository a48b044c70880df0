//! Small utility helpers used across modules.

/// Very small and safe string templating.
/// Replaces occurrences of `{key}` in the template with provided values.
/// This is intentionally simple (no nested/conditional logic).
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = tpl.to_string();
  for (k, v) in pairs {
    let needle = format!("{{{}}}", k);
    out = out.replace(&needle, v);
  }
  out
}

/// Strip a Markdown code fence (```json ... ``` or ``` ... ```) around a model reply.
/// Models asked for "JSON only" still wrap their output every so often.
pub fn strip_code_fence(s: &str) -> &str {
  let t = s.trim();
  let Some(rest) = t.strip_prefix("```") else { return t };
  let rest = rest.strip_prefix("json").unwrap_or(rest);
  rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Clamp a requested item count into `[1, max]`.
pub fn clamp_count(requested: i64, max: usize) -> usize {
  if requested < 1 {
    1
  } else {
    (requested as usize).min(max)
  }
}

/// Percentage with one decimal, 0 when the denominator is 0.
pub fn percent_1dp(part: i64, whole: i64) -> f64 {
  if whole <= 0 {
    return 0.0;
  }
  ((part as f64) * 1000.0 / (whole as f64)).round() / 10.0
}

/// Log-safe truncation for large strings.
/// Avoids spamming logs with huge request/response payloads.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.chars().count() <= max {
    s.to_string()
  } else {
    let head: String = s.chars().take(max).collect();
    format!("{}… ({} bytes total)", head, s.len())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fill_template_replaces_all_keys() {
    let out = fill_template("{n} {difficulty} questions for {cert}", &[("n", "3"), ("difficulty", "advanced"), ("cert", "A+")]);
    assert_eq!(out, "3 advanced questions for A+");
  }

  #[test]
  fn strip_code_fence_handles_json_and_plain_fences() {
    assert_eq!(strip_code_fence("```json\n[1, 2]\n```"), "[1, 2]");
    assert_eq!(strip_code_fence("```\n{\"a\": 1}\n```"), "{\"a\": 1}");
    assert_eq!(strip_code_fence("  [3]  "), "[3]");
  }

  #[test]
  fn clamp_count_bounds() {
    assert_eq!(clamp_count(0, 5), 1);
    assert_eq!(clamp_count(-4, 5), 1);
    assert_eq!(clamp_count(3, 5), 3);
    assert_eq!(clamp_count(50, 5), 5);
  }

  #[test]
  fn percent_rounds_to_one_decimal() {
    assert_eq!(percent_1dp(2, 3), 66.7);
    assert_eq!(percent_1dp(0, 0), 0.0);
    assert_eq!(percent_1dp(5, 5), 100.0);
  }

  #[test]
  fn trunc_for_log_keeps_short_strings() {
    assert_eq!(trunc_for_log("short", 10), "short");
    assert!(trunc_for_log("a much longer string", 4).starts_with("a mu…"));
  }
}
