// ABOUTME: Integration tests for identifiers and image references.
// ABOUTME: Tests parsing round trips and identifier properties through the public API.

use dockyard::types::*;
use proptest::prelude::*;

mod image_ref_tests {
    use super::*;

    #[test]
    fn parse_full_reference() {
        let img = ImageRef::parse("quay.io/eris/keys:0.12@sha256:feed").unwrap();
        assert_eq!(img.registry(), Some("quay.io"));
        assert_eq!(img.name(), "eris/keys");
        assert_eq!(img.tag(), Some("0.12"));
        assert_eq!(img.digest(), Some("sha256:feed"));
        assert_eq!(img.to_string(), "quay.io/eris/keys:0.12@sha256:feed");
    }

    #[test]
    fn from_str_matches_parse() {
        let parsed: ImageRef = "busybox:1.36".parse().unwrap();
        assert_eq!(parsed, ImageRef::parse("busybox:1.36").unwrap());
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        assert_eq!(ImageRef::parse("  keys  ").unwrap().to_string(), "keys:latest");
    }

    #[test]
    fn error_messages_name_the_problem() {
        let err = ImageRef::parse("keys!").unwrap_err();
        assert_eq!(err.to_string(), "invalid character '!' in image reference");
    }

    proptest! {
        #[test]
        fn canonical_form_is_stable(
            name in "[a-z][a-z0-9]{0,10}",
            tag in proptest::option::of("[a-z0-9][a-z0-9.]{0,6}"),
        ) {
            let input = match &tag {
                Some(t) => format!("{}:{}", name, t),
                None => name.clone(),
            };
            let once = ImageRef::parse(&input).unwrap().to_string();
            let twice = ImageRef::parse(&once).unwrap().to_string();
            prop_assert_eq!(&once, &twice);
            prop_assert_eq!(once, format!("{}:{}", name, tag.as_deref().unwrap_or("latest")));
        }
    }
}

mod id_tests {
    use super::*;

    #[test]
    fn container_id_stores_value() {
        let id = ContainerId::new("0123456789abcdef0123");
        assert_eq!(id.as_str(), "0123456789abcdef0123");
        assert_eq!(id.short(), "0123456789ab");
        assert_eq!(id.clone().into_inner(), "0123456789abcdef0123");
    }

    #[test]
    fn image_id_short_drops_algorithm() {
        let id = ImageId::new("sha256:fedcba9876543210fedcba");
        assert_eq!(id.short(), "fedcba987654");
    }

    #[test]
    fn short_ids_stay_whole() {
        assert_eq!(ContainerId::new("abc").short(), "abc");
    }

    #[test]
    fn ids_compare_by_value() {
        assert_eq!(ContainerId::new("a"), ContainerId::new("a"));
        assert_ne!(ContainerId::new("a"), ContainerId::new("b"));
    }
}
