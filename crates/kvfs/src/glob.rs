//! Shell-style name matching.
//!
//! Patterns support `*` (any run of characters, including none) and `?`
//! (exactly one character). A pattern matches a whole name, never a
//! substring, and never crosses a path separator because matching is
//! applied per directory component.

/// True if `s` contains glob metacharacters.
pub fn is_pattern(s: &str) -> bool {
    s.contains(['*', '?'])
}

/// Match `name` against `pattern`.
///
/// Iterative with a single backtrack point for the most recent `*`, so
/// pathological patterns stay linear in practice.
pub fn glob_match(pattern: &str, name: &str) -> bool {
    let pat: Vec<char> = pattern.chars().collect();
    let nam: Vec<char> = name.chars().collect();

    let mut px = 0;
    let mut nx = 0;
    let mut next_px = 0;
    let mut next_nx = 0;

    while px < pat.len() || nx < nam.len() {
        if px < pat.len() {
            match pat[px] {
                '?' => {
                    if nx < nam.len() {
                        px += 1;
                        nx += 1;
                        continue;
                    }
                }
                '*' => {
                    // Try the empty match first; on mismatch, come back
                    // here with the star consuming one more character.
                    next_px = px;
                    next_nx = nx + 1;
                    px += 1;
                    continue;
                }
                c => {
                    if nx < nam.len() && nam[nx] == c {
                        px += 1;
                        nx += 1;
                        continue;
                    }
                }
            }
        }
        if 0 < next_nx && next_nx <= nam.len() {
            px = next_px;
            nx = next_nx;
            continue;
        }
        return false;
    }
    true
}
