use cosmian_role_crypt::{
    abe_policy::{AccessPolicy, AttributeSet, DimensionBuilder, Namespace},
    bytes_ser_de::Serializable,
    Error, RoleCrypt,
};
use criterion::{criterion_group, criterion_main, Criterion};

// Namespace settings
fn namespace() -> Result<Namespace, Error> {
    let mut namespace = Namespace::new();
    namespace.add_dimension(DimensionBuilder::new(
        "role",
        vec!["admin", "teacher", "student"],
    ))?;
    namespace.add_dimension(DimensionBuilder::new(
        "dept",
        vec!["math", "physics", "history", "biology", "languages"],
    ))?;
    Ok(namespace)
}

/// Policies targeting an increasing number of coordinates.
fn access_policies() -> Vec<(&'static str, AccessPolicy)> {
    [
        ("1 coordinate", "role:admin and dept:math"),
        ("6 coordinates", "role:teacher"),
        ("12 coordinates", "(role:teacher) or (role:student)"),
        ("19 coordinates", "not dept:math"),
    ]
    .into_iter()
    .map(|(name, expression)| {
        (
            name,
            AccessPolicy::parse(expression).expect("cannot parse access policy"),
        )
    })
    .collect()
}

fn bench_setup(c: &mut Criterion) {
    let rc = RoleCrypt::default();
    let namespace = namespace().expect("cannot generate namespace");
    c.bench_function("Setup", |b| {
        b.iter(|| rc.setup(&namespace).expect("cannot run setup"));
    });
}

fn bench_key_generation(c: &mut Criterion) {
    let rc = RoleCrypt::default();
    let namespace = namespace().expect("cannot generate namespace");
    let (_, msk) = rc.setup(&namespace).expect("cannot run setup");
    let attributes = AttributeSet::try_from_pairs([("role", "teacher"), ("dept", "math")])
        .expect("cannot build attributes");
    c.bench_function("Key generation", |b| {
        b.iter(|| {
            rc.generate_key(&msk, &attributes)
                .expect("cannot generate key")
        });
    });
}

fn bench_encryption(c: &mut Criterion) {
    let rc = RoleCrypt::default();
    let namespace = namespace().expect("cannot generate namespace");
    let (pp, _) = rc.setup(&namespace).expect("cannot run setup");

    let mut group = c.benchmark_group("Encryption");
    for (name, policy) in access_policies() {
        group.bench_function(name, |b| {
            b.iter(|| {
                rc.encrypt(&pp, &policy, b"report card")
                    .expect("cannot encrypt")
            });
        });
    }
    group.finish();
}

fn bench_decryption(c: &mut Criterion) {
    let rc = RoleCrypt::default();
    let namespace = namespace().expect("cannot generate namespace");
    let (pp, msk) = rc.setup(&namespace).expect("cannot run setup");
    let key = rc
        .generate_key(
            &msk,
            &AttributeSet::try_from_pairs([("role", "admin"), ("dept", "math")])
                .expect("cannot build attributes"),
        )
        .expect("cannot generate key");

    let mut group = c.benchmark_group("Decryption");
    // every policy is satisfied by the key
    for (name, policy) in access_policies() {
        let ciphertext = rc
            .encrypt(&pp, &(policy | AccessPolicy::term("role", "admin")), b"report card")
            .expect("cannot encrypt")
            .serialize()
            .expect("cannot serialize ciphertext");
        group.bench_function(name, |b| {
            b.iter(|| rc.decrypt_bytes(&key, &ciphertext).expect("cannot decrypt"));
        });
    }
    group.finish();
}

criterion_group!(
    name = benches;
    config = Criterion::default().sample_size(100);
    targets =
        bench_setup,
        bench_key_generation,
        bench_encryption,
        bench_decryption
);

criterion_main!(benches);
