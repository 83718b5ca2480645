use super::AppUsage;

/// Label of the synthetic entry that collects everything outside the top entries.
pub const OTHER_LABEL: &str = "Other";

/// Keeps the `n` largest entries of a list sorted ascending by usage and collapses the rest into
/// a leading [OTHER_LABEL] entry. Lists of at most `n` entries are returned untouched.
pub fn filter_top(usages: Vec<AppUsage>, n: usize) -> Vec<AppUsage> {
    if usages.len() <= n {
        return usages;
    }

    let total: i64 = usages.iter().map(|v| v.seconds).sum();
    let top = usages[usages.len() - n..].to_vec();
    let top_total: i64 = top.iter().map(|v| v.seconds).sum();

    let mut result = Vec::with_capacity(n + 1);
    result.push(AppUsage {
        app_name: OTHER_LABEL.into(),
        seconds: total - top_total,
    });
    result.extend(top);
    result
}
