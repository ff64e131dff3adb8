pub mod posnet_controller;
