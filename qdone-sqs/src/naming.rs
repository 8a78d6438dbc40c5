//! Queue name normalisation (component B).
//!
//! Every function here is pure: given the same `(name, options)` pair it
//! always returns the same string, and applying it twice is a no-op.

use qdone_common::Options;

/// Prepends the configured prefix. Called once, before any other
/// normalisation, to turn a caller-supplied base name into a stored name.
#[must_use]
pub fn qualify(base: &str, options: &Options) -> String {
    format!("{}{base}", options.prefix)
}

/// Strips a trailing `.fifo`, then reappends it iff FIFO mode is on and the
/// name does not end in a wildcard `*`. Idempotent.
#[must_use]
pub fn normalise(name: &str, options: &Options) -> String {
    let stem = name.strip_suffix(".fifo").unwrap_or(name);
    if options.fifo && !stem.ends_with('*') {
        format!("{stem}.fifo")
    } else {
        stem.to_string()
    }
}

/// Derives the fail-queue name from an already-qualified primary name.
#[must_use]
pub fn fail_name(qualified_primary: &str, options: &Options) -> String {
    derived_name(qualified_primary, &options.fail_suffix, options)
}

/// Derives the dead-letter-queue name from an already-qualified fail name.
#[must_use]
pub fn dlq_name(qualified_fail: &str, options: &Options) -> String {
    derived_name(qualified_fail, &options.dlq_suffix, options)
}

fn derived_name(qualified: &str, suffix: &str, options: &Options) -> String {
    let stripped_fifo = qualified.strip_suffix(".fifo").unwrap_or(qualified);
    let stem = stripped_fifo.strip_suffix(suffix).unwrap_or(stripped_fifo);
    let with_suffix = format!("{stem}{suffix}");
    if options.fifo {
        format!("{with_suffix}.fifo")
    } else {
        with_suffix
    }
}

/// Whether a (qualified, normalised) name is a fail queue, used by the
/// worker loop to exclude fail queues from the default working set.
#[must_use]
pub fn is_fail_queue_name(name: &str, options: &Options) -> bool {
    let stem = name.strip_suffix(".fifo").unwrap_or(name);
    stem.ends_with(options.fail_suffix.as_str())
}
