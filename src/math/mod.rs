pub mod primes;

pub use primes::{
    generate_primes, get_first_prime_down, get_first_prime_up, is_ntt_friendly_prime, is_prime,
    is_prime_reference,
};
