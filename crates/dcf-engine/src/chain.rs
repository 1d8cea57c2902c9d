/// A fallback strategy: either produces a result for the input or declares
/// itself not applicable.
pub type Strategy<I, T> = fn(&I) -> Option<T>;

/// Run strategies in order and return the first applicable result.
pub fn first_applicable<I, T>(input: &I, chain: &[Strategy<I, T>]) -> Option<T> {
    chain.iter().find_map(|strategy| strategy(input))
}

/// Like [`first_applicable`], with a terminal strategy that always applies.
pub fn resolve<I, T>(input: &I, chain: &[Strategy<I, T>], last_resort: fn(&I) -> T) -> T {
    first_applicable(input, chain).unwrap_or_else(|| last_resort(input))
}
