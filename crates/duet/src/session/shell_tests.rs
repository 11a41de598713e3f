// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    bash = { "/bin/bash", ShellFamily::Bash },
    sh = { "/bin/sh", ShellFamily::Bash },
    usr_zsh = { "/usr/bin/zsh", ShellFamily::Zsh },
    fish = { "/opt/homebrew/bin/fish", ShellFamily::Fish },
    pwsh = { "/usr/local/bin/pwsh", ShellFamily::PowerShell },
    pwsh_exe = { "pwsh.exe", ShellFamily::PowerShell },
    nu = { "/usr/bin/nu", ShellFamily::Unknown },
    empty = { "", ShellFamily::Unknown },
)]
fn detect_by_basename(path: &str, expected: ShellFamily) {
    assert_eq!(ShellFamily::detect(path), expected);
}

#[test]
fn preamble_ends_with_clear_and_cr() -> anyhow::Result<()> {
    for family in [ShellFamily::Bash, ShellFamily::Zsh, ShellFamily::Fish] {
        let line = integration_preamble(family)
            .ok_or_else(|| anyhow::anyhow!("missing preamble for {family:?}"))?;
        assert!(line.ends_with("clear\r"), "family {family:?}: {line:?}");
        assert!(line.contains("]7;file://"));
    }
    let ps = integration_preamble(ShellFamily::PowerShell)
        .ok_or_else(|| anyhow::anyhow!("missing powershell preamble"))?;
    assert!(ps.ends_with("cls\r"));
    assert!(ps.contains("COMPUTERNAME"));
    Ok(())
}

#[test]
fn unknown_family_has_no_preamble() {
    assert_eq!(integration_preamble(ShellFamily::Unknown), None);
}
