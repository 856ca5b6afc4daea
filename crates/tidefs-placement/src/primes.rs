//! Prime helpers for sizing the Maglev lookup table

/// All primes `<= n`, ascending (linear sieve)
#[must_use]
pub fn primes_until(n: usize) -> Vec<usize> {
    let mut primes = Vec::new();
    if n < 2 {
        return primes;
    }

    let mut composite = vec![false; n + 1];
    for i in 2..=n {
        if !composite[i] {
            primes.push(i);
        }
        for &p in &primes {
            if i * p > n {
                break;
            }
            composite[i * p] = true;
            // every composite is crossed off once, by its smallest factor
            if i % p == 0 {
                break;
            }
        }
    }
    primes
}

/// Smallest prime strictly greater than `n`
#[must_use]
pub fn next_prime_of(n: usize) -> usize {
    // Bertrand: there is a prime in (n, 2n + 2]
    let limit = n.saturating_mul(2).saturating_add(2);
    primes_until(limit)
        .into_iter()
        .find(|&p| p > n)
        .unwrap_or_else(|| next_prime_by_trial(n))
}

/// Fallback for `n` close to `usize::MAX`, where the sieve bound saturates
fn next_prime_by_trial(n: usize) -> usize {
    let is_prime = |c: usize| c >= 2 && (2..).take_while(|&d| d <= c / d).all(|d| c % d != 0);
    (n.saturating_add(1)..=usize::MAX)
        .find(|&c| is_prime(c))
        .unwrap_or(usize::MAX)
}
