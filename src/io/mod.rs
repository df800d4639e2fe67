pub mod bitvec;
pub mod fasta;
pub mod sam;
