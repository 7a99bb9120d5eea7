pub mod etherbone;
