//! Digest assembly, rendering and publishing.

pub mod assemble;
pub mod publish;
pub mod render;

pub use assemble::{CategoryTable, Digest, DigestAssembler, DigestRow, SourceSection};
pub use publish::{publish_digest, sink_from_env, DigestSink, FsDigestSink, GithubDigestSink, MockSink};
pub use render::{render_json, render_markdown};
