use crate::error::Error;

#[test]
fn exit_codes_distinguish_the_taxonomy() {
    assert_eq!(Error::schema("missing field `id`").exit_code(), 3);
    assert_eq!(
        Error::ResourceExhausted {
            needed_bytes: 100,
            budget_bytes: 10,
            guidance: "try making the chunk size smaller".into(),
        }
        .exit_code(),
        4
    );
    assert_eq!(Error::TypeConstraint("not a matrix".into()).exit_code(), 5);
    assert_eq!(Error::other("anything else").exit_code(), 1);
}

#[test]
fn schema_message_names_the_field() {
    let err = Error::schema("field `items` missing on user record 3");
    assert!(err.to_string().contains("items"));
}

#[test]
fn resource_exhausted_message_carries_guidance() {
    let err = Error::ResourceExhausted {
        needed_bytes: 2048,
        budget_bytes: 1024,
        guidance: "increase the splits divisor".into(),
    };
    let text = err.to_string();
    assert!(text.contains("2048"));
    assert!(text.contains("increase the splits divisor"));
}
