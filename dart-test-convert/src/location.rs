// Copyright (c) The dart-test-convert Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resolution of runner location urls to filesystem paths.

use camino::Utf8PathBuf;

/// Scheme prefix the consumer's "jump to test" machinery understands.
pub const DART_LOCATION_PREFIX: &str = "dart_location://";

pub(crate) const FILE_URL_PREFIX: &str = "file://";

/// Resolves an opaque location url from the runner (`file:` or `package:`
/// form) into a filesystem path.
///
/// The converter asks the resolver for every entity that carries a url;
/// returning `None` falls back to the owning suite's path, then to the last
/// location learned from a loading/compiling virtual test, then to the
/// literal `unknown`.
///
/// Closures of type `Fn(&str) -> Option<Utf8PathBuf>` implement this trait,
/// which keeps tests and simple embeddings short.
pub trait LocationResolver {
    /// Returns the path the url points at, or `None` when it cannot be
    /// resolved.
    fn resolve(&self, url: &str) -> Option<Utf8PathBuf>;
}

impl<F> LocationResolver for F
where
    F: Fn(&str) -> Option<Utf8PathBuf>,
{
    fn resolve(&self, url: &str) -> Option<Utf8PathBuf> {
        self(url)
    }
}

/// A resolver that understands `file://` urls and nothing else.
///
/// `package:` urls need knowledge of the package layout and are left to the
/// embedder; this covers the common case of runners reporting absolute file
/// urls.
#[derive(Clone, Copy, Debug, Default)]
pub struct FileUrlResolver;

impl LocationResolver for FileUrlResolver {
    fn resolve(&self, url: &str) -> Option<Utf8PathBuf> {
        url.strip_prefix(FILE_URL_PREFIX).map(Utf8PathBuf::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_urls_resolve_to_their_path() {
        let resolver = FileUrlResolver;
        assert_eq!(
            resolver.resolve("file:///work/app/test/calc_test.dart"),
            Some(Utf8PathBuf::from("/work/app/test/calc_test.dart"))
        );
        assert_eq!(resolver.resolve("package:app/calc_test.dart"), None);
    }

    #[test]
    fn closures_are_resolvers() {
        let resolver = |url: &str| {
            url.strip_suffix(".dart")
                .map(|stem| Utf8PathBuf::from(format!("/resolved/{stem}")))
        };
        assert_eq!(
            resolver.resolve("calc_test.dart"),
            Some(Utf8PathBuf::from("/resolved/calc_test"))
        );
    }
}
