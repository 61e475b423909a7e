//! `hexfiles.txt`: targets whose images need a softdevice or bootloader
//! merged after linking.

use crate::scan::TargetScan;

/// One block per target with hex files: the target ID, then one
/// tab-indented line per file.
pub fn hex_report<'a>(scans: impl IntoIterator<Item = &'a TargetScan>) -> String {
    scans
        .into_iter()
        .filter(|scan| !scan.base.hex_files.is_empty())
        .flat_map(|scan| {
            let files = scan.base.hex_files.iter().map(|file| format!("\t{file}\n"));
            std::iter::once(format!("{}\n", scan.id)).chain(files)
        })
        .collect()
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;

    #[test]
    fn only_targets_with_hex_files_are_listed() {
        let mut nrf = TargetScan::new("NRF51_DK");
        nrf.base.hex_files = vec![
            "targets/NRF51/s130_nrf51_2.0.0_softdevice.hex".into(),
            "targets/NRF51/bootloader.hex".into(),
        ];
        let k64f = TargetScan::new("K64F");

        assert_eq!(
            hex_report([&nrf, &k64f]),
            "NRF51_DK\n\ttargets/NRF51/s130_nrf51_2.0.0_softdevice.hex\n\ttargets/NRF51/bootloader.hex\n"
        );
    }

    #[test]
    fn no_hex_files_gives_empty_report() {
        assert!(hex_report([&TargetScan::new("K64F")]).is_empty());
    }
}
