mod common;

use common::{Harness, N, assert_close, automorphism, negacyclic_product};
use toy_mkrlwe::{
    Ciphertext, ConjugationKeySet, MkError, PartyId, RelinearizationKeySet, RotationKeySet,
    SecretKey, SecretKeySet,
};

struct Party {
    sk: SecretKey<N>,
    pk: toy_mkrlwe::PublicKey<N>,
}

fn parties(h: &mut Harness, ids: &[&str]) -> Vec<Party> {
    ids.iter()
        .map(|&id| {
            let (sk, pk) = h.kg.gen_key_pair(id).unwrap();
            Party { sk, pk }
        })
        .collect()
}

fn secret_set(parties: &[Party]) -> SecretKeySet<N> {
    SecretKeySet::try_from_keys(parties.iter().map(|p| p.sk.clone())).unwrap()
}

fn relin_set(h: &mut Harness, parties: &[Party]) -> RelinearizationKeySet<N> {
    RelinearizationKeySet::try_from_keys(
        parties
            .iter()
            .map(|p| h.kg.gen_relinearization_key(&p.sk).unwrap())
            .collect::<Vec<_>>(),
    )
    .unwrap()
}

fn sum(a: &[f64], b: &[f64]) -> Vec<f64> {
    common::padded(a)
        .iter()
        .zip(common::padded(b))
        .map(|(x, y)| x + y)
        .collect()
}

fn ids(ct: &Ciphertext<N>) -> Vec<&str> {
    ct.ids().map(PartyId::as_str).collect()
}

#[test]
fn addition_is_homomorphic_over_different_party_sets() {
    let mut h = Harness::new(&[], 200);
    let ps = parties(&mut h, &["alice", "bob", "carol"]);
    let ab = h
        .eval
        .add_new(
            &h.enc.encrypt_new(&h.encode(&[1.0, 2.0]), &ps[0].pk).unwrap(),
            &h.enc.encrypt_new(&h.encode(&[0.5, -1.0]), &ps[1].pk).unwrap(),
        )
        .unwrap();
    let bc = h
        .eval
        .add_new(
            &h.enc.encrypt_new(&h.encode(&[3.0]), &ps[1].pk).unwrap(),
            &h.enc.encrypt_new(&h.encode(&[0.0, 0.0, 7.0]), &ps[2].pk).unwrap(),
        )
        .unwrap();

    let sum = h.eval.add_new(&ab, &bc).unwrap();
    assert_eq!(ids(&sum), ["alice", "bob", "carol"]);
    let decoded = h.dec.decrypt(&sum, &secret_set(&ps)).unwrap().decode();
    assert_close(&decoded, &[4.5, 1.0, 7.0], 1e-6);

    let diff = h.eval.sub_new(&ab, &bc).unwrap();
    let decoded = h.dec.decrypt(&diff, &secret_set(&ps)).unwrap().decode();
    assert_close(&decoded, &[-1.5, 1.0, -7.0], 1e-6);

    let negated = h.eval.neg_new(&ab).unwrap();
    let decoded = h.dec.decrypt(&negated, &secret_set(&ps)).unwrap().decode();
    assert_close(&decoded, &[-1.5, -1.0], 1e-6);
}

#[test]
fn multiplication_relinearizes_to_the_union_of_parties() {
    let mut h = Harness::new(&[], 210);
    let ps = parties(&mut h, &["alice", "bob", "carol"]);
    let rlks = relin_set(&mut h, &ps);

    let x = [1.5, -0.5, 0.25];
    let y = [0.75, 2.0];
    let z = [-1.0, 0.0, 0.5];
    let ct_ab = h
        .eval
        .add_new(
            &h.enc.encrypt_new(&h.encode(&x), &ps[0].pk).unwrap(),
            &h.enc.encrypt_new(&h.encode(&y), &ps[1].pk).unwrap(),
        )
        .unwrap();
    let ct_bc = h
        .eval
        .add_new(
            &h.enc.encrypt_new(&h.encode(&y), &ps[1].pk).unwrap(),
            &h.enc.encrypt_new(&h.encode(&z), &ps[2].pk).unwrap(),
        )
        .unwrap();

    let product = h.eval.mul_relin_new(&ct_ab, &ct_bc, &rlks).unwrap();
    assert_eq!(product.party_count(), 3);
    let product = h.eval.rescale_new(&product).unwrap();

    let lhs = sum(&x, &y);
    let rhs = sum(&y, &z);
    let expected = negacyclic_product(&lhs, &rhs);
    let decoded = h.dec.decrypt(&product, &secret_set(&ps)).unwrap().decode();
    assert_close(&decoded, &expected, 1e-4);
}

#[test]
fn squaring_a_single_party_ciphertext() {
    let mut h = Harness::new(&[], 220);
    let ps = parties(&mut h, &["alice"]);
    let rlks = relin_set(&mut h, &ps);
    let x = [0.5, 1.0, -2.0];
    let ct = h.enc.encrypt_new(&h.encode(&x), &ps[0].pk).unwrap();

    let squared = h.eval.mul_relin_new(&ct, &ct, &rlks).unwrap();
    assert_eq!(ids(&squared), ["alice"]);
    let squared = h.eval.rescale_new(&squared).unwrap();
    let decoded = h.dec.decrypt(&squared, &secret_set(&ps)).unwrap().decode();
    assert_close(&decoded, &negacyclic_product(&x, &x), 1e-4);
}

#[test]
fn multiplication_requires_every_relinearization_key() {
    let mut h = Harness::new(&[], 230);
    let ps = parties(&mut h, &["alice", "bob"]);
    let rlks = relin_set(&mut h, &ps[..1]);
    let a = h.enc.encrypt_new(&h.encode(&[1.0]), &ps[0].pk).unwrap();
    let b = h.enc.encrypt_new(&h.encode(&[1.0]), &ps[1].pk).unwrap();
    assert_eq!(
        h.eval.mul_relin_new(&a, &b, &rlks).unwrap_err(),
        MkError::MissingEvaluationKey {
            kind: "relinearization",
            id: PartyId::from("bob")
        }
    );
}

#[test]
fn plaintext_operations_keep_the_party_set() {
    let mut h = Harness::new(&[], 240);
    let ps = parties(&mut h, &["alice", "bob"]);
    let x = [2.0, 1.0];
    let joint = h
        .eval
        .add_new(
            &h.enc.encrypt_new(&h.encode(&x), &ps[0].pk).unwrap(),
            &h.enc.encrypt_new(&h.encode(&[0.0, 0.0, 1.0]), &ps[1].pk).unwrap(),
        )
        .unwrap();
    let m = [0.5, -0.5];

    let shifted = h.eval.add_plaintext_new(&joint, &h.encode(&m)).unwrap();
    assert_eq!(ids(&shifted), ["alice", "bob"]);
    let decoded = h.dec.decrypt(&shifted, &secret_set(&ps)).unwrap().decode();
    assert_close(&decoded, &[2.5, 0.5, 1.0], 1e-6);

    let scaled = h.eval.mul_plaintext_new(&joint, &h.encode(&m)).unwrap();
    let scaled = h.eval.rescale_new(&scaled).unwrap();
    let decoded = h.dec.decrypt(&scaled, &secret_set(&ps)).unwrap().decode();
    assert_close(&decoded, &negacyclic_product(&[2.0, 1.0, 1.0], &m), 1e-4);
}

#[test]
fn rotation_applies_the_galois_automorphism() {
    let mut h = Harness::new(&[1, 3], 250);
    let ps = parties(&mut h, &["alice", "bob"]);
    let mut rotation_keys = RotationKeySet::new();
    for p in &ps {
        for r in [1, 3] {
            rotation_keys
                .insert(h.kg.gen_rotation_key(r, &p.sk).unwrap())
                .unwrap();
        }
    }
    let x = [1.0, 2.0, 3.0, -4.0];
    let y = [0.0, 0.5];
    let joint = h
        .eval
        .add_new(
            &h.enc.encrypt_new(&h.encode(&x), &ps[0].pk).unwrap(),
            &h.enc.encrypt_new(&h.encode(&y), &ps[1].pk).unwrap(),
        )
        .unwrap();
    let plain = sum(&x, &y);

    for r in [1, 3] {
        let rotated = h.eval.rotate_new(&joint, r, &rotation_keys).unwrap();
        assert_eq!(ids(&rotated), ["alice", "bob"]);
        let galois = h.params.galois_element_for_rotation(r);
        let decoded = h.dec.decrypt(&rotated, &secret_set(&ps)).unwrap().decode();
        assert_close(&decoded, &automorphism(&plain, galois), 1e-5);
    }
}

#[test]
fn conjugation_applies_the_inverse_automorphism() {
    let mut h = Harness::new(&[], 260);
    let ps = parties(&mut h, &["alice", "bob"]);
    let conjugation_keys = ConjugationKeySet::try_from_keys(
        ps.iter()
            .map(|p| h.kg.gen_conjugation_key(&p.sk).unwrap())
            .collect::<Vec<_>>(),
    )
    .unwrap();
    let x = [1.0, -2.0, 0.0, 0.5];
    let joint = h
        .eval
        .add_new(
            &h.enc.encrypt_new(&h.encode(&x), &ps[0].pk).unwrap(),
            &h.enc.encrypt_new(&h.encode(&[0.0]), &ps[1].pk).unwrap(),
        )
        .unwrap();

    let conjugated = h.eval.conjugate_new(&joint, &conjugation_keys).unwrap();
    let galois = h.params.galois_element_for_conjugation();
    let decoded = h
        .dec
        .decrypt(&conjugated, &secret_set(&ps))
        .unwrap()
        .decode();
    assert_close(&decoded, &automorphism(&x, galois), 1e-5);
}

#[test]
fn key_switching_moves_a_component_to_another_party() {
    let mut h = Harness::new(&[], 270);
    let ps = parties(&mut h, &["alice", "bob"]);
    let x = [6.0, -3.0];
    let ct = h.enc.encrypt_new(&h.encode(&x), &ps[0].pk).unwrap();

    let swk = h.kg.gen_swk(&ps[0].sk, &ps[1].pk);
    let switched = h.eval.key_switch_to_new(&ct, &swk, ps[1].sk.id()).unwrap();
    assert_eq!(ids(&switched), ["bob"]);

    let bob_only = secret_set(&ps[1..]);
    let decoded = h.dec.decrypt(&switched, &bob_only).unwrap().decode();
    assert_close(&decoded, &x, 1e-5);
}

#[test]
fn product_tree_matches_sequential_fold() {
    let mut h = Harness::new(&[], 280);
    let ps = parties(&mut h, &["p0", "p1", "p2", "p3"]);
    let rlks = relin_set(&mut h, &ps);
    let sks = secret_set(&ps);

    for k in [1, 2, 3, 4, 8] {
        let inputs: Vec<[f64; 2]> = (0..k)
            .map(|i| [0.9 + 0.05 * i as f64, 0.3 - 0.1 * (i % 3) as f64])
            .collect();
        let cts: Vec<_> = inputs
            .iter()
            .enumerate()
            .map(|(i, m)| h.enc.encrypt_new(&h.encode(m), &ps[i % 4].pk).unwrap())
            .collect();

        let tree = h.eval.mul_relin_tree(&cts, &rlks, true).unwrap();
        let mut fold = cts[0].clone();
        for ct in &cts[1..] {
            let product = h.eval.mul_relin_new(&fold, ct, &rlks).unwrap();
            fold = h.eval.rescale_new(&product).unwrap();
        }

        let expected = inputs
            .iter()
            .skip(1)
            .fold(common::padded(&inputs[0]), |acc, m| {
                negacyclic_product(&acc, m)
            });
        let tree_decoded = h.dec.decrypt(&tree, &sks).unwrap().decode();
        let fold_decoded = h.dec.decrypt(&fold, &sks).unwrap().decode();
        assert_close(&tree_decoded, &expected, 1e-3);
        assert_close(&fold_decoded, &tree_decoded, 1e-3);
        assert_eq!(tree.party_count(), k.min(4));
        let depth = (k as f64).log2().ceil() as usize;
        assert_eq!(tree.level(), h.params.max_level() - depth);
        assert_eq!(fold.level(), h.params.max_level() - (k - 1));
    }
}

#[test]
fn aggregated_group_keys_evaluate_under_the_summed_secret() {
    let mut h = Harness::new(&[1], 290);
    let members: Vec<_> = (0..2).map(|_| h.kg.gen_key_pair("g").unwrap()).collect();
    let secrets: Vec<_> = members.iter().map(|(sk, _)| sk.clone()).collect();
    let publics: Vec<_> = members.iter().map(|(_, pk)| pk.clone()).collect();

    let group_sk = h.kg.gen_group_secret_key(&secrets).unwrap();
    let group_pk = h.kg.gen_group_public_key(&publics).unwrap();
    let rot = secrets
        .iter()
        .map(|sk| h.kg.gen_rotation_key(1, sk).unwrap())
        .collect::<Vec<_>>();
    let conj = secrets
        .iter()
        .map(|sk| h.kg.gen_conjugation_key(sk).unwrap())
        .collect::<Vec<_>>();
    let rlk = secrets
        .iter()
        .map(|sk| h.kg.gen_relinearization_key(sk).unwrap())
        .collect::<Vec<_>>();
    let mut rotation_keys = RotationKeySet::new();
    rotation_keys
        .insert(h.kg.gen_group_rot_key(&rot).unwrap())
        .unwrap();
    let conjugation_keys =
        ConjugationKeySet::try_from_keys([h.kg.gen_group_conj_key(&conj).unwrap()]).unwrap();
    let relin_keys =
        RelinearizationKeySet::try_from_keys([h.kg.gen_group_relin_key(&rlk).unwrap()]).unwrap();
    let sks = SecretKeySet::try_from_keys([group_sk]).unwrap();

    let x = [1.0, -0.5, 2.0, 0.25];
    let ct = h.enc.encrypt_new(&h.encode(&x), &group_pk).unwrap();
    assert_eq!(ids(&ct), ["g"]);
    assert_close(&h.dec.decrypt(&ct, &sks).unwrap().decode(), &x, 1e-5);

    let rotated = h.eval.rotate_new(&ct, 1, &rotation_keys).unwrap();
    let galois = h.params.galois_element_for_rotation(1);
    let decoded = h.dec.decrypt(&rotated, &sks).unwrap().decode();
    assert_close(&decoded, &automorphism(&x, galois), 1e-5);

    let conjugated = h.eval.conjugate_new(&ct, &conjugation_keys).unwrap();
    let galois = h.params.galois_element_for_conjugation();
    let decoded = h.dec.decrypt(&conjugated, &sks).unwrap().decode();
    assert_close(&decoded, &automorphism(&x, galois), 1e-5);

    let squared = h.eval.mul_relin_new(&ct, &ct, &relin_keys).unwrap();
    let squared = h.eval.rescale_new(&squared).unwrap();
    let decoded = h.dec.decrypt(&squared, &sks).unwrap().decode();
    assert_close(&decoded, &negacyclic_product(&x, &x), 1e-4);
}
