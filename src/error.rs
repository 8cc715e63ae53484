/// Failures surfaced by the command engine and its helpers.
///
/// Callers inspect these procedurally: redirection, pipe and fork failures
/// are fatal to the affected process, everything else is reported and the
/// line loop continues.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// An error occurred while opening or rebinding a redirection target.
    #[error("failed to redirect to {0}: {1}")]
    RedirectionFailure(String, #[source] std::io::Error),

    /// A `<` or `>` operator appeared with no filename after it.
    #[error("expected a file name after `{0}`")]
    MissingRedirectionTarget(&'static str),

    /// The standard descriptors could not be duplicated for later restore.
    #[error("failed to snapshot standard descriptors: {0}")]
    DescriptorSnapshot(#[source] nix::errno::Errno),

    /// The kernel refused to create a pipe.
    #[error("failed to create pipe: {0}")]
    PipeCreation(#[source] nix::errno::Errno),

    /// A fork failed.
    #[error("fork failed: {0}")]
    ForkFailure(#[source] nix::errno::Errno),
}
