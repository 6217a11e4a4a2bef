use emulite::TargetArch;
use predicates::prelude::*;
use rstest::rstest;

mod common;

#[test]
fn test_print_command_default_target() {
    let ctx = common::emulite();
    let kernel = ctx.fixture.kernel(TargetArch::X64);

    ctx.new_cmd()
        .arg("print-command")
        .assert()
        .success()
        .stdout(predicate::str::contains("bin/qemu-system-x86_64 -kernel"))
        .stdout(predicate::str::contains(kernel.to_str().unwrap()))
        .stdout(predicate::str::contains("-machine q35"))
        .stdout(predicate::str::contains("-append 'devmgr.epoch="))
        .stdout(predicate::str::contains(
            " TERM=dumb kernel.serial=legacy kernel.halt-on-panic=true' -nographic",
        ))
        .stdout(predicate::str::ends_with("-nographic\n"));
}

#[rstest]
#[case("arm64", "qemu-system-aarch64", "-machine virt", "virtio-net-pci")]
#[case("x64", "qemu-system-x86_64", "-machine q35", "e1000")]
fn test_print_command_per_target(
    #[case] target: &str,
    #[case] binary: &str,
    #[case] machine: &str,
    #[case] nic: &str,
) {
    let ctx = common::emulite();

    ctx.new_cmd()
        .args(["--target-cpu", target, "print-command"])
        .assert()
        .success()
        .stdout(predicate::str::contains(binary))
        .stdout(predicate::str::contains(machine))
        .stdout(predicate::str::contains(nic));
}

#[test]
fn test_print_command_resources() {
    let ctx = common::emulite();

    ctx.new_cmd()
        .args(["--cpu-cores", "2", "--ram-size-mb", "512", "print-command"])
        .assert()
        .success()
        .stdout(predicate::str::contains("-m 512 -smp 2"));
}

#[test]
fn test_print_command_json() {
    let ctx = common::emulite();

    let output = ctx
        .new_cmd()
        .args(["print-command", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["kvm"], false);
    assert!(value["host_ssh_port"].as_u64().unwrap() > 0);
    let args: Vec<&str> = value["args"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a.as_str().unwrap())
        .collect();
    assert_eq!(args[0], "-kernel");
    assert_eq!(args.last(), Some(&"-nographic"));
    assert_eq!(
        value["blobstore_image"].as_str().unwrap(),
        ctx.fixture.cached_image().to_str().unwrap()
    );
}

#[test]
fn test_print_command_missing_kernel() {
    let ctx = common::emulite();
    std::fs::remove_file(ctx.fixture.kernel(TargetArch::Arm64)).unwrap();

    ctx.new_cmd()
        .args(["--target-cpu", "arm64", "print-command"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"))
        .stderr(predicate::str::contains("qemu-kernel.kernel"));
}

#[test]
fn test_print_command_without_configuration() {
    let ctx = common::emulite();

    ctx.bare_cmd()
        .arg("print-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("sdk_root is not set"));
}

#[test]
fn test_invalid_target_cpu() {
    let ctx = common::emulite();

    ctx.new_cmd()
        .args(["--target-cpu", "riscv64", "print-command"])
        .assert()
        .failure();
}
