/*!
Platform seam.

The session core never talks to a device directly; the embedding driver
supplies a [`Platform`] implementation when it builds the session.
*/

mod traits;

pub use traits::Platform;

#[cfg(test)]
pub(crate) mod fake;
