use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use openssl::sha::sha256;
use subtle::ConstantTimeEq;

/// SHA-256 of the UTF-8 bytes of `data`, rendered as padded standard Base64.
pub fn sha256_base64(data: &str) -> String {
    BASE64.encode(sha256(data.as_bytes()))
}

/// Computes the Posnet message authentication code.
///
/// The key is first folded together with the terminal id:
/// `inner = b64(sha256(key ";" tid))`. The transaction fields are then hashed
/// with it: `b64(sha256([extra ";"] xid ";" amount ";" currency ";" mid ";" inner))`.
///
/// Field order and the `;` separator are fixed by the bank. The 3-D resolve
/// response is signed with `extra = mdStatus`; request MACs carry no extra.
pub fn compute_mac(
    xid: &str,
    amount: &str,
    currency: &str,
    merchant_id: &str,
    key: &str,
    terminal_id: &str,
    extra: Option<&str>,
) -> String {
    let inner = sha256_base64(&format!("{};{}", key, terminal_id));
    let payload = match extra {
        Some(extra) => format!(
            "{};{};{};{};{};{}",
            extra, xid, amount, currency, merchant_id, inner
        ),
        None => format!("{};{};{};{};{}", xid, amount, currency, merchant_id, inner),
    };
    sha256_base64(&payload)
}

/// Constant-time comparison of a locally computed MAC with one sent by the bank.
pub fn verify_mac(expected: &str, received: &str) -> bool {
    expected.as_bytes().ct_eq(received.as_bytes()).unwrap_u8() == 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const XID: &str = "YKB_0000080603153823";
    const AMOUNT: &str = "5696";
    const CURRENCY: &str = "TL";
    const MID: &str = "6706598320";
    const KEY: &str = "10,10,10,10,10,10,10,10";
    const TID: &str = "67005551";

    fn reference_mac(extra: Option<&str>) -> String {
        compute_mac(XID, AMOUNT, CURRENCY, MID, KEY, TID, extra)
    }

    #[test]
    fn sha256_base64_matches_known_digest() {
        assert_eq!(
            sha256_base64("abc"),
            "ungWv48Bz+pBQUDeXa4iI7ADYaOWF3qctBD/YfIAFa0="
        );
    }

    #[test]
    fn mac_is_chained_digest() {
        let inner = sha256_base64(&format!("{};{}", KEY, TID));
        let expected = sha256_base64(&format!(
            "{};{};{};{};{}",
            XID, AMOUNT, CURRENCY, MID, inner
        ));
        assert_eq!(reference_mac(None), expected);
    }

    #[test]
    fn extra_is_prepended() {
        let inner = sha256_base64(&format!("{};{}", KEY, TID));
        let expected = sha256_base64(&format!(
            "1;{};{};{};{};{}",
            XID, AMOUNT, CURRENCY, MID, inner
        ));
        assert_eq!(reference_mac(Some("1")), expected);
        assert_ne!(reference_mac(Some("1")), reference_mac(None));
    }

    #[test]
    fn mac_is_deterministic() {
        assert_eq!(reference_mac(None), reference_mac(None));
        assert_eq!(reference_mac(Some("9")), reference_mac(Some("9")));
    }

    #[test]
    fn every_field_changes_the_mac() {
        let base = reference_mac(None);
        let variants = [
            compute_mac("YKB_0000080603153824", AMOUNT, CURRENCY, MID, KEY, TID, None),
            compute_mac(XID, "5697", CURRENCY, MID, KEY, TID, None),
            compute_mac(XID, AMOUNT, "US", MID, KEY, TID, None),
            compute_mac(XID, AMOUNT, CURRENCY, "6706598321", KEY, TID, None),
            compute_mac(XID, AMOUNT, CURRENCY, MID, "10,10,10,10,10,10,10,11", TID, None),
            compute_mac(XID, AMOUNT, CURRENCY, MID, KEY, "67005552", None),
        ];
        for variant in variants {
            assert_ne!(variant, base);
        }
    }

    #[test]
    fn verify_mac_compares_exactly() {
        let mac = reference_mac(None);
        assert!(verify_mac(&mac, &mac));
        assert!(!verify_mac(&mac, &reference_mac(Some("1"))));
        assert!(!verify_mac(&mac, ""));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn changing_a_field_changes_the_mac(
            xid in "[A-Za-z0-9]{20}",
            amount in "[0-9]{1,10}",
            mid in "[0-9]{10}",
            key in "[0-9,]{8,23}",
            tid in "[0-9]{8}",
            extra in proptest::option::of("[0-9]"),
            suffix in "[0-9A-Z]",
        ) {
            let extra = extra.as_deref();
            let base = compute_mac(&xid, &amount, "TL", &mid, &key, &tid, extra);
            prop_assert_eq!(&base, &compute_mac(&xid, &amount, "TL", &mid, &key, &tid, extra));

            let changed_amount = format!("{amount}{suffix}");
            prop_assert_ne!(&base, &compute_mac(&xid, &changed_amount, "TL", &mid, &key, &tid, extra));

            let changed_key = format!("{key}{suffix}");
            prop_assert_ne!(&base, &compute_mac(&xid, &amount, "TL", &mid, &changed_key, &tid, extra));

            let changed_extra = match extra {
                Some(value) => format!("{value}{suffix}"),
                None => suffix.clone(),
            };
            prop_assert_ne!(
                &base,
                &compute_mac(&xid, &amount, "TL", &mid, &key, &tid, Some(&changed_extra))
            );
        }
    }
}
