//! Deduplication keys for image sources.
//!
//! The identifier depends only on the source string (remote URL or inline
//! `data:` payload), never on the fetched bytes. MD5 keeps identifiers
//! compatible with stores written by earlier versions of the tool; digest
//! collisions are accepted and make two sources count as one image.

/// Compute the identifier of an image source as lowercase hex.
pub fn identify(source: &str) -> String {
    format!("{:x}", md5::compute(source.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identify_is_deterministic() {
        let url = "https://example.com/images/fox.jpg";
        assert_eq!(identify(url), identify(url));
        assert_eq!(identify(url).len(), 32);
    }

    #[test]
    fn test_identify_known_digest() {
        assert_eq!(identify(""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(identify("abc"), "900150983cd24fb0d6963f7d28e17f72");
    }

    #[test]
    fn test_identify_distinguishes_sources() {
        assert_ne!(
            identify("https://example.com/a.jpg"),
            identify("https://example.com/b.jpg")
        );
    }
}
