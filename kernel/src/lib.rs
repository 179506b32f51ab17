// src/lib.rs
// Point d'entrée de la bibliothèque du noyau
//
// Cœur ordonnanceur d'Argon OS : blocs de contrôle processus/thread,
// état global de l'ordonnanceur et protocole de fork avec rollback ordonné.
// Les builds de test sont hébergés (std) pour exécuter la suite sur l'hôte.
#![cfg_attr(not(test), no_std)]

// Import de alloc pour les allocations dynamiques
extern crate alloc;

// Modules du noyau
pub mod memory;
pub mod scheduler;
pub mod sync;
pub mod syscall;

pub use scheduler::{SchedError, SchedResult, Scheduler, Tid};
