use tracing::debug;

/// Replace each token containing `*` with its filesystem matches, in the
/// lexicographic order the glob iterator yields them, preserving the
/// relative order of all other tokens. A pattern that matches nothing (or
/// fails to parse) passes through literally; entries the iterator cannot
/// read are skipped.
pub fn expand_wildcards(args: Vec<String>) -> Vec<String> {
    let mut expanded = Vec::with_capacity(args.len());
    for arg in args {
        if !arg.contains('*') {
            expanded.push(arg);
            continue;
        }
        let Ok(paths) = glob::glob(&arg) else {
            expanded.push(arg);
            continue;
        };
        let matches: Vec<String> = paths
            .filter_map(Result::ok)
            .map(|path| path.to_string_lossy().into_owned())
            .collect();
        if matches.is_empty() {
            expanded.push(arg);
        } else {
            debug!(pattern = %arg, count = matches.len(), "expanded wildcard");
            expanded.extend(matches);
        }
    }
    expanded
}
