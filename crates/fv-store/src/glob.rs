/// Match `text` against a Redis-style glob supporting `*`, `?` and `\`
/// escapes.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();

    let (mut pi, mut ti) = (0, 0);
    // Position of the last `*` and the text index it was tried at.
    let mut star: Option<(usize, usize)> = None;

    while ti < t.len() {
        match p.get(pi) {
            Some('*') => {
                star = Some((pi, ti));
                pi += 1;
                continue;
            }
            Some('?') => {
                pi += 1;
                ti += 1;
                continue;
            }
            Some('\\') if pi + 1 < p.len() && p[pi + 1] == t[ti] => {
                pi += 2;
                ti += 1;
                continue;
            }
            Some(c) if *c != '\\' && *c == t[ti] => {
                pi += 1;
                ti += 1;
                continue;
            }
            _ => {}
        }

        match star {
            Some((sp, st)) => {
                pi = sp + 1;
                ti = st + 1;
                star = Some((sp, st + 1));
            }
            None => return false,
        }
    }

    p[pi..].iter().all(|c| *c == '*')
}

#[cfg(test)]
mod tests {
    use super::glob_match;

    #[test]
    fn test_literal() {
        assert!(glob_match("market:ABC", "market:ABC"));
        assert!(!glob_match("market:ABC", "market:ABD"));
        assert!(!glob_match("market:AB", "market:ABC"));
    }

    #[test]
    fn test_star() {
        assert!(glob_match("market:*", "market:KXHIGH-25"));
        assert!(glob_match("market:*", "market:"));
        assert!(glob_match("*:stats", "algo:weather:stats"));
        assert!(glob_match("a*b*c", "axxbyyc"));
        assert!(!glob_match("a*b*c", "axxbyy"));
        assert!(!glob_match("market:*", "markets:X"));
    }

    #[test]
    fn test_question_mark() {
        assert!(glob_match("k?y", "key"));
        assert!(!glob_match("k?y", "ky"));
    }

    #[test]
    fn test_escape() {
        assert!(glob_match("a\\*b", "a*b"));
        assert!(!glob_match("a\\*b", "axb"));
    }
}
