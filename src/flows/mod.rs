//! Authentication flow decision engine.
//!
//! Pure-ish policy modules: each takes the identity client, the cookie
//! jar and a command, and returns a redirect or a typed error. The HTTP
//! layer in [`crate::api`] only translates these decisions.

pub mod completion;
pub mod context;
pub mod factors;
pub mod gate;
pub mod initiation;
pub mod login;
pub mod loginname;
pub mod mfa;
pub mod password;
pub mod routes;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;
