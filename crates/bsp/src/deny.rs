//! Targets left out of the BSP unless `--alltargets` is given.
//!
//! Each entry records why the target fails to build or run the stock
//! samples with GCC.

/// `(target, reason)` pairs.
pub const IGNORED_TARGETS: &[(&str, &str)] = &[
    // Not compiled with the command-line tools
    ("ELEKTOR_COCORICO", "Wrong target configuration, no 'device_has' attribute"),
    ("KL26Z", "undefined reference to 'init_data_bss'"),
    ("LPC11U37_501", "fatal error: device.h: No such file or directory"),
    ("LPC11U68", "multiple definition of '__aeabi_atexit'"),
    (
        "SAMG55J19",
        "error: 's' undeclared here: #define OPTIMIZE_HIGH __attribute__((optimize(s)))",
    ),
    ("LPC810", "region 'FLASH' overflowed by 2832 bytes"),
    ("LPC2368", "undefined reference to '__get_PRIMASK'"),
    ("LPC2460", "undefined reference to '__get_PRIMASK'"),
    ("MTM_MTCONNECT04S_OTA", "fatal error: device.h: No such file or directory"),
    // Hex merge problems
    ("NRF51_MICROBIT_BOOT", "Hex file problem"),
    ("ARCH_BLE", "Hex file problem"),
    ("RBLAB_NRF51822", "Hex file problem"),
    ("RBLAB_BLENANO", "Hex file problem"),
    ("NRF51822_BOOT", "Hex file problem"),
    ("NRF51_MICROBIT", "Hex file problem"),
    ("WALLBOT_BLE", "Hex file problem"),
    ("WALLBOT_BLE_OTA", "Hex file problem"),
    ("MTM_MTCONNECT04S", "Hex file problem"),
    ("MTM_MTCONNECT04S_BOOT", "Hex file problem"),
    ("TY51822R3_BOOT", "Hex file problem"),
    ("NRF51822_OTA", "Hex file problem"),
    ("RBLAB_NRF51822_OTA", "Hex file problem"),
    ("NRF51822_Y5_MBUG", "Hex file problem"),
    ("NRF51822", "Hex file problem"),
    ("ARCH_BLE_BOOT", "Hex file problem"),
    ("RBLAB_BLENANO_BOOT", "Hex file problem"),
    ("TY51822R3_OTA", "Hex file problem"),
    ("SEEED_TINY_BLE", "Hex file problem"),
    ("RBLAB_NRF51822_BOOT", "Hex file problem"),
    ("NRF51_DK_LEGACY", "Hex file problem"),
    ("DELTA_DFCM_NNN40_OTA", "Hex file problem"),
    ("TY51822R3", "Hex file problem"),
    ("NRF51_DONGLE_LEGACY", "Hex file problem"),
    ("DELTA_DFBM_NQ620", "Hex file problem"),
    ("WALLBOT_BLE_BOOT", "Hex file problem"),
    ("DELTA_DFCM_NNN40", "Hex file problem"),
    ("SEEED_TINY_BLE_OTA", "Hex file problem"),
    ("ARCH_LINK_OTA", "Hex file problem"),
    ("NRF51_DK_BOOT", "Hex file problem"),
    ("NRF51_DONGLE", "Hex file problem"),
    ("DELTA_DFCM_NNN40_BOOT", "Hex file problem"),
    ("NRF51_MICROBIT_B_OTA", "Hex file problem"),
    ("NRF51_MICROBIT_B_BOOT", "Hex file problem"),
    ("SEEED_TINY_BLE_BOOT", "Hex file problem"),
    ("ARCH_LINK", "Hex file problem"),
    ("NRF51_MICROBIT_B", "Hex file problem"),
    ("NRF51_DK_OTA", "Hex file problem"),
    ("RBLAB_BLENANO_OTA", "Hex file problem"),
    ("ARCH_LINK_BOOT", "Hex file problem"),
    ("ARCH_BLE_OTA", "Hex file problem"),
    ("HRM1017", "Hex file problem"),
    ("NRF52_DK", "Hex file problem"),
    ("NRF51_DONGLE_OTA", "Hex file problem"),
    ("NRF51_DONGLE_BOOT", "Hex file problem"),
    ("NRF51_MICROBIT_OTA", "Hex file problem"),
    ("NRF51_DK", "Hex file problem"),
    ("HRM1017_BOOT", "Hex file problem"),
    ("HRM1017_OTA", "Hex file problem"),
    // LED blink sample
    ("LPC1549", "error: 'sleep' was not declared in this scope"),
    ("NUMAKER_PFM_M453", "multiple definition of '__wrap__sbrk'"),
    ("NUMAKER_PFM_NUC472", "fatal error: mbedtls/config.h: No such file or directory"),
    ("RZ_A1H", "error: 'sleep' was not declared in this scope"),
    // LED blink RTOS sample
    ("KL05Z", "region 'RAM' overflowed by 3020 bytes"),
    ("VK_RZ_A1H", "multiple definition of 'eth_arch_enetif_init'"),
    ("LPC812", "region 'RAM' overflowed by 3108 bytes"),
    ("ARM_BEETLE_SOC", "undefined reference to *"),
    // USB device sample
    ("LPC1347", "region 'RAM' overflowed by 156 bytes"),
    ("MAX32620HSP", "undefined reference to *"),
    ("EFM32HG_STK3400", "region 'RAM' overflowed by 516 bytes"),
    ("MAXWSNENV", "undefined reference to *"),
    (
        "KL27Z",
        "undefined reference to 'USBHAL' + region 'm_data' overflowed by 88 bytes",
    ),
];

/// Why `target` is on the deny-list, if it is.
pub fn ignore_reason(target: &str) -> Option<&'static str> {
    IGNORED_TARGETS
        .iter()
        .find(|(id, _)| *id == target)
        .map(|(_, reason)| *reason)
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
    use std::collections::BTreeSet;

    #[test]
    fn listed_target_has_reason() {
        assert_eq!(ignore_reason("NRF52_DK"), Some("Hex file problem"));
        assert_eq!(ignore_reason("LPC810"), Some("region 'FLASH' overflowed by 2832 bytes"));
    }

    #[test]
    fn unlisted_target_is_allowed() {
        assert_eq!(ignore_reason("K64F"), None);
        assert_eq!(ignore_reason("nrf52_dk"), None);
    }

    #[test]
    fn entries_are_unique() {
        let ids: BTreeSet<_> = IGNORED_TARGETS.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids.len(), IGNORED_TARGETS.len());
    }
}
