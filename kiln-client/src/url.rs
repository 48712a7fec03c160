/// Joins a base path and an endpoint path the way `generate_path` does:
/// strip trailing slashes from the base, leading slashes from the
/// endpoint path, and join with exactly one `/`.
pub fn join_path(base_path: &str, path: &str) -> String {
    let base = base_path.trim_end_matches('/');
    let rel = path.trim_start_matches('/');

    match (base.is_empty(), rel.is_empty()) {
        (true, true) => String::new(),
        (true, false) => format!("/{rel}"),
        (false, true) => base.to_string(),
        (false, false) => format!("{base}/{rel}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_base_and_path() {
        assert_eq!(join_path("http://h/api", "/users/42"), "http://h/api/users/42");
    }

    #[test]
    fn strips_redundant_slashes() {
        assert_eq!(join_path("http://h/api/", "/users/42"), "http://h/api/users/42");
        assert_eq!(join_path("http://h/api", "users/42"), "http://h/api/users/42");
    }

    #[test]
    fn empty_base_keeps_leading_slash() {
        assert_eq!(join_path("", "/users/42"), "/users/42");
    }
}
