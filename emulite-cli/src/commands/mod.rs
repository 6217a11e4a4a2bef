pub mod check_kvm;
pub mod prepare_disk;
pub mod print_command;
pub mod run;
